//! Repository configuration in Git config grammar.
//!
//! Only the grammar is understood; values are kept as opaque strings.
//! Keys use dot notation: `core.bare` or `remote.origin.url`, where everything
//! between the first and last dot is the subsection.

mod parse;

use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, Result};

pub use parse::parse_config;

/// A `[section]` or `[section "subsection"]` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionKey {
    name: String,
    subsection: Option<String>,
}

impl SectionKey {
    /// Creates a section key. Section names are case-insensitive and stored lowercase;
    /// subsections are case-sensitive.
    pub fn new(name: &str, subsection: Option<&str>) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            subsection: subsection.map(str::to_string),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subsection(&self) -> Option<&str> {
        self.subsection.as_deref()
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subsection {
            Some(sub) => write!(f, "[{} \"{}\"]", self.name, escape_subsection(sub)),
            None => write!(f, "[{}]", self.name),
        }
    }
}

/// The per-repository configuration document.
///
/// Sections and keys keep insertion order so serialization is stable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepositoryConfig {
    sections: IndexMap<SectionKey, IndexMap<String, String>>,
}

impl RepositoryConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration written when a repository is bootstrapped.
    pub fn default_bare() -> Self {
        let mut config = Self::new();
        config.set("core.repositoryformatversion", "0");
        config.set("core.bare", "true");
        config
    }

    /// Parses Git config text.
    pub fn parse(input: &str) -> Result<Self> {
        parse_config(input)
    }

    /// Returns true if there are no sections.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Iterates over sections and their entries.
    pub fn sections(&self) -> impl Iterator<Item = (&SectionKey, &IndexMap<String, String>)> {
        self.sections.iter()
    }

    /// Looks up a value by dotted key.
    ///
    /// # Example
    ///
    /// ```
    /// use bucketgit_core::RepositoryConfig;
    ///
    /// let config = RepositoryConfig::default_bare();
    /// assert_eq!(config.get("core.bare"), Some("true"));
    /// assert_eq!(config.get("CORE.Bare"), Some("true"));
    /// assert_eq!(config.get("core.missing"), None);
    /// ```
    pub fn get(&self, key: &str) -> Option<&str> {
        let (section, name) = split_key(key).ok()?;
        self.sections
            .get(&section)?
            .get(&name)
            .map(String::as_str)
    }

    /// Returns a value parsed as a Git boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" | "" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }

    /// Sets a value by dotted key, creating the section if needed.
    ///
    /// Keys without a dot are ignored; use [`RepositoryConfig::try_set`] to
    /// get the error instead.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let _ = self.try_set(key, value);
    }

    /// Sets a value by dotted key, rejecting keys without a section.
    pub fn try_set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let (section, name) = split_key(key)?;
        self.insert(section, name, value.into());
        Ok(())
    }

    /// Removes a value. Empty sections are dropped.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let (section, name) = split_key(key).ok()?;
        let entries = self.sections.get_mut(&section)?;
        let removed = entries.shift_remove(&name);
        if entries.is_empty() {
            self.sections.shift_remove(&section);
        }
        removed
    }

    pub(crate) fn insert(&mut self, section: SectionKey, name: String, value: String) {
        self.sections
            .entry(section)
            .or_default()
            .insert(name, value);
    }

    pub(crate) fn ensure_section(&mut self, section: SectionKey) {
        self.sections.entry(section).or_default();
    }

    /// Serializes back to Git config text.
    pub fn serialize(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RepositoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (section, entries) in &self.sections {
            writeln!(f, "{section}")?;
            for (key, value) in entries {
                writeln!(f, "\t{key} = {}", quote_value(value))?;
            }
        }
        Ok(())
    }
}

fn split_key(key: &str) -> Result<(SectionKey, String)> {
    let (head, name) = key
        .rsplit_once('.')
        .ok_or_else(|| Error::malformed("config key", format!("'{key}' has no section")))?;
    if name.is_empty() || head.is_empty() {
        return Err(Error::malformed("config key", format!("'{key}'")));
    }
    let section = match head.split_once('.') {
        Some((section, sub)) => SectionKey::new(section, Some(sub)),
        None => SectionKey::new(head, None),
    };
    Ok((section, name.to_ascii_lowercase()))
}

fn escape_subsection(sub: &str) -> String {
    sub.replace('\\', "\\\\").replace('"', "\\\"")
}

fn quote_value(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t");
    let needs_quotes = value.starts_with(' ')
        || value.ends_with(' ')
        || value.contains('#')
        || value.contains(';');
    if needs_quotes {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}
