//! Reads the policy document from the administrative repository.

use bucketgit_core::object::{parse_commit, parse_tree};
use bucketgit_core::{AccessPolicy, Error, ObjectKind, Result};
use bucketgit_storage::GitStorage;
use tracing::debug;

/// Loads `file` from the root tree of the commit `branch_ref` points at.
///
/// Returns `None` when the branch or the file does not exist yet.
pub async fn load_policy(
    storage: &dyn GitStorage,
    branch_ref: &str,
    file: &str,
) -> Result<Option<AccessPolicy>> {
    let tip = match storage.resolve(branch_ref).await {
        Ok(tip) => tip,
        Err(e) if e.is_not_found() => {
            debug!(branch = %branch_ref, "policy branch does not exist");
            return Ok(None);
        },
        Err(e) => return Err(e),
    };

    let commit = storage.object(&tip, Some(ObjectKind::Commit)).await?;
    let tree = parse_commit(commit.data())?.tree;
    let tree = storage.object(&tree, Some(ObjectKind::Tree)).await?;

    let Some(entry) = parse_tree(tree.data())?
        .into_iter()
        .find(|entry| entry.name == file && !entry.is_tree() && !entry.is_submodule())
    else {
        debug!(file = %file, "policy file not present");
        return Ok(None);
    };

    let blob = storage.object(&entry.hash, Some(ObjectKind::Blob)).await?;
    let text = std::str::from_utf8(blob.data())
        .map_err(|e| Error::malformed("policy document", e.to_string()))?;
    AccessPolicy::from_json(text).map(Some)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bucketgit_core::{Capability, EncodedObject, Endpoint, Hash, Reference};
    use bucketgit_storage::BucketRepository;
    use object_store::memory::InMemory;
    use object_store::path::Path;

    use super::*;

    async fn repo() -> BucketRepository {
        let repo = BucketRepository::new(
            Arc::new(InMemory::new()),
            &Path::default(),
            "admin",
            Duration::from_secs(5),
        );
        repo.open("refs/heads/main").await.unwrap();
        repo
    }

    async fn commit_file(repo: &BucketRepository, name: &str, content: &str) -> Hash {
        let blob = EncodedObject::blob(content.as_bytes().to_vec());
        let mut tree = format!("100644 {name}\0").into_bytes();
        tree.extend_from_slice(blob.hash().as_bytes());
        let tree = EncodedObject::new(ObjectKind::Tree, tree);
        let commit = EncodedObject::new(
            ObjectKind::Commit,
            format!(
                "tree {}\nauthor Admin <admin@example.com> 1700000000 +0000\ncommitter Admin <admin@example.com> 1700000000 +0000\n\npolicy\n",
                tree.hash()
            ).into_bytes(),
        );
        for object in [&blob, &tree, &commit] {
            repo.put_object(object).await.unwrap();
        }
        repo.set_reference(&Reference::direct("refs/heads/main", commit.hash()))
            .await
            .unwrap();
        commit.hash()
    }

    #[tokio::test]
    async fn test_missing_branch_is_none() {
        let repo = repo().await;
        let policy = load_policy(&repo, "refs/heads/main", "config.json").await.unwrap();
        assert!(policy.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let repo = repo().await;
        commit_file(&repo, "README", "hello").await;
        let policy = load_policy(&repo, "refs/heads/main", "config.json").await.unwrap();
        assert!(policy.is_none());
    }

    #[tokio::test]
    async fn test_reads_policy_document() {
        let repo = repo().await;
        commit_file(
            &repo,
            "config.json",
            r#"{"repos": {"app": {"users": {"nobody": {"capabilities": ["web"]}}}}}"#,
        )
        .await;

        let policy = load_policy(&repo, "refs/heads/main", "config.json")
            .await
            .unwrap()
            .unwrap();
        assert!(policy.authorize(&Endpoint::new("nobody", "app", Capability::Browse)));
        assert!(!policy.authorize(&Endpoint::new("nobody", "app", Capability::Fetch)));
    }

    #[tokio::test]
    async fn test_undecodable_document_is_malformed() {
        let repo = repo().await;
        commit_file(&repo, "config.json", "{ not json").await;
        let err = load_policy(&repo, "refs/heads/main", "config.json")
            .await
            .unwrap_err();
        assert!(err.is_malformed());
    }
}
