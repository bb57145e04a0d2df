//! Git references and their storage record.

use std::fmt;

use crate::error::{Error, Result};
use crate::hash::{self, Hash};

/// Name of the symbolic reference that selects the default branch.
pub const HEAD: &str = "HEAD";

/// Prefix of the textual form of a symbolic target.
const SYMBOLIC_PREFIX: &str = "ref: ";

/// What a reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefTarget {
    /// Points directly at an object.
    Direct(Hash),
    /// Points at another reference by name (e.g. HEAD → refs/heads/main).
    Symbolic(String),
}

impl fmt::Display for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(id) => write!(f, "{id}"),
            Self::Symbolic(name) => write!(f, "{SYMBOLIC_PREFIX}{name}"),
        }
    }
}

/// A named pointer to an object or to another reference.
///
/// The storage record is `"<target> <name>"`, where `<target>` is either a
/// 40 character hex id or `ref: <other-name>`. Compare-and-swap compares
/// these records byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    name: String,
    target: RefTarget,
}

impl Reference {
    /// Creates a reference pointing at an object.
    pub fn direct(name: impl Into<String>, target: Hash) -> Self {
        Self {
            name: name.into(),
            target: RefTarget::Direct(target),
        }
    }

    /// Creates a reference pointing at another reference.
    pub fn symbolic(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: RefTarget::Symbolic(target.into()),
        }
    }

    /// Returns the full reference name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the target.
    pub fn target(&self) -> &RefTarget {
        &self.target
    }

    /// Returns the object id for direct references.
    pub fn hash(&self) -> Option<Hash> {
        match &self.target {
            RefTarget::Direct(id) => Some(*id),
            RefTarget::Symbolic(_) => None,
        }
    }

    /// Returns the referenced name for symbolic references.
    pub fn symbolic_target(&self) -> Option<&str> {
        match &self.target {
            RefTarget::Symbolic(name) => Some(name),
            RefTarget::Direct(_) => None,
        }
    }

    /// Serializes the storage record.
    pub fn to_record(&self) -> String {
        format!("{} {}", self.target, self.name)
    }

    /// Parses a storage record. The name is the last space separated field.
    pub fn from_record(record: &str) -> Result<Self> {
        let record = record.trim_end_matches('\n');
        let (target, name) = record
            .rsplit_once(' ')
            .ok_or_else(|| Error::malformed("reference record", format!("'{record}'")))?;
        if name.is_empty() {
            return Err(Error::malformed("reference record", "empty name"));
        }

        if let Some(symbolic) = target.strip_prefix(SYMBOLIC_PREFIX) {
            Ok(Self::symbolic(name, symbolic))
        } else {
            Ok(Self::direct(name, hash::parse_hex(target)?))
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_record())
    }
}

/// Validates a reference name the way `git check-ref-format` does for the
/// cases a push can produce. `HEAD` is accepted as a special case.
pub fn validate_ref_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Err(Error::malformed("reference name", format!("'{name}': {reason}")));

    if name == HEAD {
        return Ok(());
    }
    if !name.starts_with("refs/") {
        return invalid("must start with 'refs/'");
    }
    if name.ends_with('/') || name.ends_with('.') || name.ends_with(".lock") {
        return invalid("invalid ending");
    }
    if name.contains("..") || name.contains("//") || name.contains("@{") {
        return invalid("invalid sequence");
    }
    if name.split('/').any(|part| part.is_empty() || part.starts_with('.')) {
        return invalid("invalid path component");
    }
    for c in name.chars() {
        if c.is_control()
            || c == ' '
            || c == '~'
            || c == '^'
            || c == ':'
            || c == '?'
            || c == '*'
            || c == '['
            || c == '\\'
        {
            return invalid("contains invalid characters");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectKind;

    fn some_id() -> Hash {
        hash::compute(ObjectKind::Blob, b"x")
    }

    #[test]
    fn test_direct_record_roundtrip() {
        let r = Reference::direct("refs/heads/main", some_id());
        let record = r.to_record();
        assert_eq!(record, format!("{} refs/heads/main", some_id()));
        assert_eq!(Reference::from_record(&record).unwrap(), r);
    }

    #[test]
    fn test_symbolic_record_roundtrip() {
        let r = Reference::symbolic(HEAD, "refs/heads/main");
        assert_eq!(r.to_record(), "ref: refs/heads/main HEAD");
        let parsed = Reference::from_record("ref: refs/heads/main HEAD").unwrap();
        assert_eq!(parsed, r);
        assert_eq!(parsed.symbolic_target(), Some("refs/heads/main"));
        assert_eq!(parsed.hash(), None);
    }

    #[test]
    fn test_record_tolerates_trailing_newline() {
        let record = format!("{} refs/tags/v1\n", some_id());
        assert_eq!(Reference::from_record(&record).unwrap().name(), "refs/tags/v1");
    }

    #[test]
    fn test_bad_records() {
        assert!(Reference::from_record("garbage").is_err());
        assert!(Reference::from_record("nothex refs/heads/main").is_err());
        assert!(Reference::from_record(&format!("{} ", some_id())).is_err());
    }

    #[test]
    fn test_validate_ref_name() {
        assert!(validate_ref_name("refs/heads/main").is_ok());
        assert!(validate_ref_name("refs/heads/feature/x").is_ok());
        assert!(validate_ref_name("refs/tags/v1.0.0").is_ok());
        assert!(validate_ref_name(HEAD).is_ok());

        assert!(validate_ref_name("main").is_err());
        assert!(validate_ref_name("refs/heads/").is_err());
        assert!(validate_ref_name("refs/heads/a..b").is_err());
        assert!(validate_ref_name("refs/heads/a b").is_err());
        assert!(validate_ref_name("refs/heads/x.lock").is_err());
        assert!(validate_ref_name("refs/heads/.hidden").is_err());
        assert!(validate_ref_name("refs//heads").is_err());
    }
}
