#![allow(dead_code)]
use bucketgit_core::object::TreeEntry;
use bucketgit_core::{EncodedObject, Hash, ObjectKind};

/// Builds a blob from a string.
pub fn blob(content: &str) -> EncodedObject {
    EncodedObject::blob(content.as_bytes().to_vec())
}

/// Builds a tree from (mode, name, id) triples. Entries must already be sorted.
pub fn tree(entries: &[(&str, &str, Hash)]) -> EncodedObject {
    let mut data = Vec::new();
    for (mode, name, id) in entries {
        data.extend_from_slice(format!("{mode} {name}\0").as_bytes());
        data.extend_from_slice(id.as_bytes());
    }
    EncodedObject::new(ObjectKind::Tree, data)
}

/// Builds a commit pointing at `tree` with the given parents.
pub fn commit(tree: Hash, parents: &[Hash], message: &str) -> EncodedObject {
    let mut body = format!("tree {tree}\n");
    for parent in parents {
        body.push_str(&format!("parent {parent}\n"));
    }
    body.push_str("author Test <test@example.com> 1700000000 +0000\n");
    body.push_str("committer Test <test@example.com> 1700000000 +0000\n\n");
    body.push_str(message);
    EncodedObject::new(ObjectKind::Commit, body.into_bytes())
}

pub fn entry_names(entries: &[TreeEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}
