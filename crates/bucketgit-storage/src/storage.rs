//! The storage contract the protocol layer works against.

use async_trait::async_trait;
use bucketgit_core::reference::HEAD;
use bucketgit_core::{EncodedObject, Error, Hash, ObjectKind, RefTarget, Reference, RepositoryConfig, Result};
use futures::stream::BoxStream;

/// Symbolic references are followed at most this many times.
const MAX_SYMREF_DEPTH: usize = 5;

/// Storage for one repository: objects, references and config.
///
/// Errors keep their kind from the backend up: NotFound, Conflict,
/// Malformed, Backend, Timeout and Unsupported all pass through unchanged.
///
/// Optional operations are advertised through `supports_*` flags and return
/// [`Error::Unsupported`] by default.
///
/// # Example
///
/// ```ignore
/// use bucketgit_storage::GitStorage;
///
/// async fn tip(storage: &dyn GitStorage) -> bucketgit_core::Result<String> {
///     let head = storage.resolve("HEAD").await?;
///     Ok(head.to_string())
/// }
/// ```
#[async_trait]
pub trait GitStorage: Send + Sync {
    /// Stores an object under its computed id and returns that id. Idempotent.
    async fn put_object(&self, object: &EncodedObject) -> Result<Hash>;

    /// Reads an object. With `expected` set, an object of another kind is NotFound.
    async fn object(&self, id: &Hash, expected: Option<ObjectKind>) -> Result<EncodedObject>;

    /// Metadata-only existence check.
    async fn has_object(&self, id: &Hash) -> Result<bool>;

    /// Content size without transferring the body.
    async fn object_size(&self, id: &Hash) -> Result<u64>;

    /// Enumerates stored objects, optionally of one kind.
    ///
    /// Only available when [`GitStorage::supports_object_iteration`] is true.
    fn objects(&self, _kind: Option<ObjectKind>) -> BoxStream<'_, Result<EncodedObject>> {
        Box::pin(futures::stream::once(async {
            Err(Error::Unsupported("object iteration"))
        }))
    }

    /// Returns true if [`GitStorage::objects`] is implemented.
    fn supports_object_iteration(&self) -> bool {
        false
    }

    /// Reads a reference.
    async fn reference(&self, name: &str) -> Result<Reference>;

    /// Unconditional overwrite.
    async fn set_reference(&self, reference: &Reference) -> Result<()>;

    /// Writes `new` only if the stored value equals `expected`; `None` means
    /// the reference must not exist. A mismatch is [`Error::Conflict`].
    async fn compare_and_set(&self, new: &Reference, expected: Option<&Reference>) -> Result<()>;

    /// Deletes a reference only if the stored value equals `expected`.
    async fn compare_and_remove(&self, expected: &Reference) -> Result<()>;

    /// Deletes a reference; removing an absent one succeeds.
    async fn remove_reference(&self, name: &str) -> Result<()>;

    /// Lists and reads every reference. Each call takes a fresh listing; the
    /// first failed read ends the useful part of the stream.
    fn references(&self) -> BoxStream<'_, Result<Reference>>;

    /// Reads the repository config; an absent config is empty.
    async fn config(&self) -> Result<RepositoryConfig>;

    /// Overwrites the repository config.
    async fn set_config(&self, config: &RepositoryConfig) -> Result<()>;

    /// Shallow-clone boundary commits.
    async fn shallow(&self) -> Result<Vec<Hash>> {
        Err(Error::Unsupported("shallow metadata"))
    }

    /// Storage of nested submodule repositories.
    async fn submodule(&self, _name: &str) -> Result<Box<dyn GitStorage>> {
        Err(Error::Unsupported("submodules"))
    }

    /// The working-tree index. Bare repositories have none.
    async fn index(&self) -> Result<bytes::Bytes> {
        Err(Error::Unsupported("index"))
    }

    /// Follows symbolic references down to an object id.
    async fn resolve(&self, name: &str) -> Result<Hash> {
        let mut current = name.to_string();
        for _ in 0..MAX_SYMREF_DEPTH {
            match self.reference(&current).await?.target() {
                RefTarget::Direct(id) => return Ok(*id),
                RefTarget::Symbolic(next) => current = next.clone(),
            }
        }
        Err(Error::malformed(
            "reference",
            format!("symbolic chain from '{name}' is too deep"),
        ))
    }

    /// Returns the name HEAD points at, if HEAD is symbolic.
    async fn head_target(&self) -> Result<Option<String>> {
        Ok(self
            .reference(HEAD)
            .await?
            .symbolic_target()
            .map(str::to_string))
    }
}
