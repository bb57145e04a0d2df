//! A repository living under one base path of an object store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bucketgit_core::reference::HEAD;
use bucketgit_core::{EncodedObject, Hash, ObjectKind, Reference, RepositoryConfig, Result};
use futures::stream::BoxStream;
use object_store::ObjectStore;
use object_store::path::Path;
use tracing::info;

use super::{Backend, ConfigStore, ObjectStoreAdapter, ReferenceStore};
use crate::storage::GitStorage;

/// Object, reference and config stores for one repository.
#[derive(Debug)]
pub struct BucketRepository {
    path: String,
    objects: ObjectStoreAdapter,
    refs: ReferenceStore,
    config: ConfigStore,
}

impl BucketRepository {
    /// Binds a repository to `<prefix>/<path>` without touching the backend.
    pub fn new(store: Arc<dyn ObjectStore>, prefix: &Path, path: &str, timeout: Duration) -> Self {
        let base: Path = prefix.parts().chain(Path::from(path).parts()).collect();
        let backend = Backend::new(store, base, timeout);
        Self {
            path: path.to_string(),
            objects: ObjectStoreAdapter::new(backend.clone()),
            refs: ReferenceStore::new(backend.clone()),
            config: ConfigStore::new(backend),
        }
    }

    /// Opens the repository, bootstrapping it when HEAD is absent.
    ///
    /// Bootstrap writes the default bare config and points HEAD at
    /// `default_branch_ref` with a create-if-absent write, so a concurrent
    /// bootstrap elsewhere is not an error. Returns true if this call bootstrapped.
    pub async fn open(&self, default_branch_ref: &str) -> Result<bool> {
        match self.refs.get(HEAD).await {
            Ok(_) => Ok(false),
            Err(e) if e.is_not_found() => {
                self.config.set(&RepositoryConfig::default_bare()).await?;
                let head = Reference::symbolic(HEAD, default_branch_ref);
                match self.refs.compare_and_set(&head, None).await {
                    Ok(()) => {
                        info!(repo = %self.path, head = %default_branch_ref, "repository bootstrapped");
                        Ok(true)
                    },
                    Err(e) if e.is_conflict() => Ok(false),
                    Err(e) => Err(e),
                }
            },
            Err(e) => Err(e),
        }
    }

    /// Returns the repository path this handle is bound to.
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl GitStorage for BucketRepository {
    async fn put_object(&self, object: &EncodedObject) -> Result<Hash> {
        self.objects.put(object).await
    }

    async fn object(&self, id: &Hash, expected: Option<ObjectKind>) -> Result<EncodedObject> {
        self.objects.get(id, expected).await
    }

    async fn has_object(&self, id: &Hash) -> Result<bool> {
        self.objects.has(id).await
    }

    async fn object_size(&self, id: &Hash) -> Result<u64> {
        self.objects.size(id).await
    }

    fn objects(&self, kind: Option<ObjectKind>) -> BoxStream<'_, Result<EncodedObject>> {
        self.objects.iter(kind)
    }

    fn supports_object_iteration(&self) -> bool {
        true
    }

    async fn reference(&self, name: &str) -> Result<Reference> {
        self.refs.get(name).await
    }

    async fn set_reference(&self, reference: &Reference) -> Result<()> {
        self.refs.set(reference).await
    }

    async fn compare_and_set(&self, new: &Reference, expected: Option<&Reference>) -> Result<()> {
        self.refs.compare_and_set(new, expected).await
    }

    async fn compare_and_remove(&self, expected: &Reference) -> Result<()> {
        self.refs.compare_and_remove(expected).await
    }

    async fn remove_reference(&self, name: &str) -> Result<()> {
        self.refs.remove(name).await
    }

    fn references(&self) -> BoxStream<'_, Result<Reference>> {
        self.refs.iter()
    }

    async fn config(&self) -> Result<RepositoryConfig> {
        self.config.get().await
    }

    async fn set_config(&self, config: &RepositoryConfig) -> Result<()> {
        self.config.set(config).await
    }
}

#[cfg(test)]
mod tests {
    use object_store::memory::InMemory;

    use super::*;

    fn repo(store: Arc<InMemory>, path: &str) -> BucketRepository {
        BucketRepository::new(store, &Path::from("git"), path, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_open_bootstraps_once() {
        let store = Arc::new(InMemory::new());
        let repo = repo(store, "team/app");

        assert!(repo.open("refs/heads/main").await.unwrap());
        assert!(!repo.open("refs/heads/main").await.unwrap());

        assert_eq!(repo.head_target().await.unwrap().as_deref(), Some("refs/heads/main"));
        let config = GitStorage::config(&repo).await.unwrap();
        assert_eq!(config.get_bool("core.bare"), Some(true));
        assert_eq!(config.get("core.repositoryformatversion"), Some("0"));
    }

    #[tokio::test]
    async fn test_repositories_are_isolated() {
        let store = Arc::new(InMemory::new());
        let a = repo(store.clone(), "a");
        let b = repo(store, "b");

        let blob = EncodedObject::blob(&b"only in a"[..]);
        a.put_object(&blob).await.unwrap();

        assert!(a.has_object(&blob.hash()).await.unwrap());
        assert!(!b.has_object(&blob.hash()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unsupported_operations() {
        let repo = repo(Arc::new(InMemory::new()), "x");
        assert!(repo.shallow().await.unwrap_err().is_unsupported());
        assert!(repo.index().await.unwrap_err().is_unsupported());
        assert!(repo.submodule("lib").await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_follows_head() {
        let repo = repo(Arc::new(InMemory::new()), "r");
        repo.open("refs/heads/main").await.unwrap();

        let tip = EncodedObject::blob(&b"tip"[..]).hash();
        repo.set_reference(&Reference::direct("refs/heads/main", tip))
            .await
            .unwrap();
        assert_eq!(repo.resolve(HEAD).await.unwrap(), tip);
    }

    #[tokio::test]
    async fn test_resolve_unborn_head_is_not_found() {
        let repo = repo(Arc::new(InMemory::new()), "r");
        repo.open("refs/heads/main").await.unwrap();
        assert!(repo.resolve(HEAD).await.unwrap_err().is_not_found());
    }
}
