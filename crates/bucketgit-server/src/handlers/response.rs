//! JSON bodies of the browse endpoints.

use bucketgit_core::object::{CommitInfo, TreeEntry};
use bucketgit_core::Hash;
use serde::Serialize;

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryIndex {
    pub repositories: Vec<String>,
}

/// One entry of a tree listing.
#[derive(Debug, Clone, Serialize)]
pub struct TreeItem {
    pub name: String,
    pub id: String,
    /// Octal mode as Git prints it, e.g. `100644`.
    pub mode: String,
}

impl From<&TreeEntry> for TreeItem {
    fn from(entry: &TreeEntry) -> Self {
        Self {
            name: entry.name.clone(),
            id: entry.hash.to_string(),
            mode: format!("{:06o}", entry.mode),
        }
    }
}

/// Body of a directory view.
#[derive(Debug, Clone, Serialize)]
pub struct TreeListing {
    /// Commit the listing was taken from.
    pub commit: String,
    pub path: String,
    pub dirs: Vec<TreeItem>,
    pub files: Vec<TreeItem>,
}

impl TreeListing {
    /// Splits entries into directories and everything else, keeping tree order.
    pub fn new(commit: Hash, path: &str, entries: &[TreeEntry]) -> Self {
        let (dirs, files): (Vec<_>, Vec<_>) = entries.iter().partition(|e| e.is_tree());
        Self {
            commit: commit.to_string(),
            path: path.to_string(),
            dirs: dirs.into_iter().map(TreeItem::from).collect(),
            files: files.into_iter().map(TreeItem::from).collect(),
        }
    }
}

/// Body of `GET /{repo}/commit/...`.
#[derive(Debug, Clone, Serialize)]
pub struct CommitSummary {
    pub id: String,
    pub tree: String,
    pub parents: Vec<String>,
    pub author: String,
    pub committer: String,
    pub message: String,
}

impl CommitSummary {
    pub fn new(id: Hash, info: CommitInfo) -> Self {
        Self {
            id: id.to_string(),
            tree: info.tree.to_string(),
            parents: info.parents.iter().map(Hash::to_string).collect(),
            author: info.author,
            committer: info.committer,
            message: info.message,
        }
    }
}
