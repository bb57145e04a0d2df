//! Commit, tree and tag readers on top of `gix-object`.
//!
//! Only the fields needed to walk the object graph and to browse a tree are
//! kept; signatures are flattened to their header text.

use gix::actor::SignatureRef;
use gix::objs::{CommitRef, TagRef, TreeRef};

use super::ObjectKind;
use crate::error::{Error, Result};
use crate::hash::Hash;

/// Mode of a gitlink (submodule commit) tree entry.
const GITLINK_MODE: u32 = 0o160000;
/// Mode bits identifying a directory entry.
const TREE_MODE: u32 = 0o040000;

/// Decoded commit header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub tree: Hash,
    pub parents: Vec<Hash>,
    /// `Name <email> <time> <offset>`, as in the commit header.
    pub author: String,
    pub committer: String,
    pub message: String,
}

/// One entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: u32,
    pub name: String,
    pub hash: Hash,
}

impl TreeEntry {
    /// Returns true for subdirectories.
    pub fn is_tree(&self) -> bool {
        self.mode == TREE_MODE
    }

    /// Returns true for gitlinks, whose target lives in another repository.
    pub fn is_submodule(&self) -> bool {
        self.mode == GITLINK_MODE
    }
}

/// Parses a commit body.
pub fn parse_commit(data: &[u8]) -> Result<CommitInfo> {
    let commit = CommitRef::from_bytes(data).map_err(|e| Error::malformed("commit", e.to_string()))?;
    Ok(CommitInfo {
        tree: commit.tree(),
        parents: commit.parents().collect(),
        author: signature(&commit.author),
        committer: signature(&commit.committer),
        message: commit.message.to_string(),
    })
}

fn signature(s: &SignatureRef<'_>) -> String {
    format!("{} <{}> {}", s.name, s.email, s.time)
}

/// Parses a tree body: repeated `<octal mode> <name>\0<20 byte id>`.
pub fn parse_tree(data: &[u8]) -> Result<Vec<TreeEntry>> {
    let tree = TreeRef::from_bytes(data).map_err(|e| Error::malformed("tree", e.to_string()))?;
    Ok(tree
        .entries
        .into_iter()
        .map(|entry| TreeEntry {
            mode: u32::from(entry.mode.value()),
            name: entry.filename.to_string(),
            hash: entry.oid.to_owned(),
        })
        .collect())
}

/// Parses the `object` and `type` headers of an annotated tag.
pub fn parse_tag_target(data: &[u8]) -> Result<(Hash, ObjectKind)> {
    let tag = TagRef::from_bytes(data).map_err(|e| Error::malformed("tag", e.to_string()))?;
    Ok((tag.target(), ObjectKind::from(tag.target_kind)))
}
