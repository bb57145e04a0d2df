//! Git objects.
//!
//! An [`EncodedObject`] is the immutable unit of the object store. Its id is
//! always computed from its kind and content; there is no way to build one
//! with a caller-chosen id.

mod envelope;
mod links;

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::hash::{self, Hash};

pub use envelope::{decode_envelope, encode_envelope, read_envelope_header};
pub use links::{CommitInfo, TreeEntry, parse_commit, parse_tag_target, parse_tree};

/// The four Git object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    /// Returns the name used in envelopes and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
        }
    }
}

impl From<gix::objs::Kind> for ObjectKind {
    fn from(kind: gix::objs::Kind) -> Self {
        match kind {
            gix::objs::Kind::Commit => Self::Commit,
            gix::objs::Kind::Tree => Self::Tree,
            gix::objs::Kind::Blob => Self::Blob,
            gix::objs::Kind::Tag => Self::Tag,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "commit" => Ok(Self::Commit),
            "tree" => Ok(Self::Tree),
            "blob" => Ok(Self::Blob),
            "tag" => Ok(Self::Tag),
            other => Err(Error::malformed("object kind", format!("unknown kind '{other}'"))),
        }
    }
}

/// An immutable Git object together with its computed id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedObject {
    kind: ObjectKind,
    data: Bytes,
    hash: Hash,
}

impl EncodedObject {
    /// Creates an object, computing its id from kind and content.
    pub fn new(kind: ObjectKind, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let hash = hash::compute(kind, &data);
        Self { kind, data, hash }
    }

    /// Shorthand for a blob.
    pub fn blob(data: impl Into<Bytes>) -> Self {
        Self::new(ObjectKind::Blob, data)
    }

    /// Returns the object kind.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Returns the content size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Returns the raw content (without envelope header).
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Returns the computed id.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Returns the ids this object points at: tree and parents for a commit,
    /// entries for a tree (submodule commits excluded), target for a tag.
    pub fn links(&self) -> Result<Vec<Hash>> {
        match self.kind {
            ObjectKind::Blob => Ok(Vec::new()),
            ObjectKind::Commit => {
                let commit = parse_commit(&self.data)?;
                let mut out = Vec::with_capacity(commit.parents.len() + 1);
                out.push(commit.tree);
                out.extend(commit.parents);
                Ok(out)
            },
            ObjectKind::Tree => Ok(parse_tree(&self.data)?
                .into_iter()
                .filter(|e| !e.is_submodule())
                .map(|e| e.hash)
                .collect()),
            ObjectKind::Tag => Ok(vec![parse_tag_target(&self.data)?.0]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            ObjectKind::Commit,
            ObjectKind::Tree,
            ObjectKind::Blob,
            ObjectKind::Tag,
        ] {
            assert_eq!(kind.as_str().parse::<ObjectKind>().unwrap(), kind);
            let gix_kind = gix::objs::Kind::from_bytes(kind.as_str().as_bytes()).unwrap();
            assert_eq!(ObjectKind::from(gix_kind), kind);
        }
        assert!("ofs-delta".parse::<ObjectKind>().is_err());
    }

    #[test]
    fn test_hash_is_computed() {
        let a = EncodedObject::blob(&b"hello\n"[..]);
        assert_eq!(a.hash().to_string(), "ce013625030ba8dba906f756967f9e9ca394464a");
        assert_eq!(a.size(), 6);

        let b = EncodedObject::new(ObjectKind::Blob, b"hello\n".to_vec());
        assert_eq!(a, b);
    }

    #[test]
    fn test_blob_has_no_links() {
        assert!(EncodedObject::blob(&b"x"[..]).links().unwrap().is_empty());
    }

    #[test]
    fn test_commit_links() {
        let tree = hash::compute(ObjectKind::Tree, b"");
        let parent = hash::compute(ObjectKind::Blob, b"p");
        let body = format!(
            "tree {tree}\nparent {parent}\nauthor A <a@x> 0 +0000\ncommitter A <a@x> 0 +0000\n\nmsg\n"
        );
        let commit = EncodedObject::new(ObjectKind::Commit, body.into_bytes());
        assert_eq!(commit.links().unwrap(), vec![tree, parent]);
    }
}
