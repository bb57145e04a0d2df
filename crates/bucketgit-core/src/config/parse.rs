use super::{RepositoryConfig, SectionKey};
use crate::error::{Error, Result};

/// Parses Git config text into a [`RepositoryConfig`].
///
/// Supports `[section]`, `[section "subsection"]` and the legacy
/// `[section.subsection]` headers, `#` and `;` comments, quoted values with
/// `\"`, `\\`, `\n` and `\t` escapes, and bare keys (boolean true).
pub fn parse_config(input: &str) -> Result<RepositoryConfig> {
    let mut config = RepositoryConfig::new();
    let mut current: Option<SectionKey> = None;

    for (line_num, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            let section = parse_header(line).map_err(|reason| {
                Error::malformed("config", format!("line {}: {reason}", line_num + 1))
            })?;
            config.ensure_section(section.clone());
            current = Some(section);
            continue;
        }

        let Some(section) = current.clone() else {
            return Err(Error::malformed(
                "config",
                format!("line {}: key outside of any section", line_num + 1),
            ));
        };

        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value)),
            None => (strip_comment(line).trim(), None),
        };
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::malformed(
                "config",
                format!("line {}: invalid key '{key}'", line_num + 1),
            ));
        }

        let value = match value {
            Some(value) => parse_value(value).map_err(|reason| {
                Error::malformed("config", format!("line {}: {reason}", line_num + 1))
            })?,
            None => "true".to_string(),
        };
        config.insert(section, key.to_ascii_lowercase(), value);
    }

    Ok(config)
}

fn parse_header(line: &str) -> std::result::Result<SectionKey, String> {
    let close = line.rfind(']').ok_or("unterminated section header")?;
    let trailing = line[close + 1..].trim();
    if !trailing.is_empty() && !trailing.starts_with('#') && !trailing.starts_with(';') {
        return Err("unexpected text after section header".to_string());
    }
    let inner = &line[1..close];

    if let Some((name, rest)) = inner.split_once(char::is_whitespace) {
        let rest = rest.trim();
        let quoted = rest
            .strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .ok_or("subsection must be quoted")?;
        return Ok(SectionKey::new(check_section_name(name)?, Some(&unescape(quoted))));
    }

    match inner.split_once('.') {
        Some((name, sub)) => Ok(SectionKey::new(
            check_section_name(name)?,
            Some(&sub.to_ascii_lowercase()),
        )),
        None => Ok(SectionKey::new(check_section_name(inner)?, None)),
    }
}

fn check_section_name(name: &str) -> std::result::Result<&str, String> {
    if !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        Ok(name)
    } else {
        Err(format!("invalid section name '{name}'"))
    }
}

fn parse_value(raw: &str) -> std::result::Result<String, String> {
    let mut out = String::new();
    let mut in_quotes = false;
    // Whitespace outside quotes is kept only between words.
    let mut pending_space = String::new();
    let mut chars = raw.trim_start().chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push_str(&pending_space);
                pending_space.clear();
                in_quotes = !in_quotes;
            },
            '\\' => {
                out.push_str(&pending_space);
                pending_space.clear();
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('b') => {
                        out.pop();
                    },
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some(other) => return Err(format!("invalid escape '\\{other}'")),
                    None => return Err("line continuation is not supported".to_string()),
                }
            },
            '#' | ';' if !in_quotes => break,
            c if c.is_whitespace() && !in_quotes => pending_space.push(c),
            c => {
                out.push_str(&pending_space);
                pending_space.clear();
                out.push(c);
            },
        }
    }

    if in_quotes {
        return Err("unterminated quoted value".to_string());
    }
    Ok(out)
}

fn strip_comment(line: &str) -> &str {
    match line.find(['#', ';']) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
