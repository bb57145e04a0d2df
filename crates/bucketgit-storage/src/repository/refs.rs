//! Reference storage with compare-and-swap.
//!
//! Each reference is one key holding its `"<target> <name>"` record.
//! Atomicity of [`ReferenceStore::compare_and_set`] comes from the backend's
//! conditional put: create-if-absent for new references, update-if-version
//! for existing ones. There is no in-process lock.

use bucketgit_core::{Error, Reference, Result};
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::{GetResult, PutMode, UpdateVersion};
use tracing::{debug, warn};

use super::Backend;
use crate::error::{bounded, from_store};

/// Placeholder used in Conflict errors for "no value".
const ABSENT: &str = "<absent>";

#[derive(Debug, Clone)]
pub struct ReferenceStore {
    backend: Backend,
}

/// A stored record together with the version needed to update it.
struct Versioned {
    reference: Reference,
    version: UpdateVersion,
}

impl ReferenceStore {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Reads a reference.
    pub async fn get(&self, name: &str) -> Result<Reference> {
        let path = self.backend.ref_path(name);
        Ok(self.read_at(&path, name).await?.reference)
    }

    async fn read_at(&self, path: &Path, what: &str) -> Result<Versioned> {
        let what = format!("ref {what}");
        let store = self.backend.store();
        bounded(self.backend.timeout(), async {
            let result = store.get(path).await.map_err(|e| from_store(&what, e))?;
            decode(result, &what).await
        })
        .await
    }

    /// Like [`ReferenceStore::read_at`] but maps NotFound to `None`.
    async fn try_read(&self, path: &Path, name: &str) -> Result<Option<Versioned>> {
        match self.read_at(path, name).await {
            Ok(found) => Ok(Some(found)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Unconditional overwrite.
    pub async fn set(&self, reference: &Reference) -> Result<()> {
        let path = self.backend.ref_path(reference.name());
        let what = format!("ref {}", reference.name());
        let record = Bytes::from(reference.to_record());
        let store = self.backend.store();
        bounded(self.backend.timeout(), async {
            store
                .put(&path, record.into())
                .await
                .map_err(|e| from_store(&what, e))
        })
        .await?;
        debug!(reference = %reference, "reference set");
        Ok(())
    }

    /// Writes `new` if the stored value equals `expected` (`None`: absent).
    pub async fn compare_and_set(&self, new: &Reference, expected: Option<&Reference>) -> Result<()> {
        match expected {
            None => self.create(new).await,
            Some(old) => self.update(new, old).await,
        }?;
        debug!(reference = %new, "reference updated");
        Ok(())
    }

    async fn create(&self, new: &Reference) -> Result<()> {
        let path = self.backend.ref_path(new.name());
        let record = Bytes::from(new.to_record());
        let what = format!("ref {}", new.name());
        let store = self.backend.store();

        loop {
            let put = bounded(self.backend.timeout(), async {
                Ok(store
                    .put_opts(&path, record.clone().into(), PutMode::Create.into())
                    .await)
            })
            .await?;

            match put {
                Ok(_) => return Ok(()),
                Err(object_store::Error::AlreadyExists { .. }) => {
                    match self.try_read(&path, new.name()).await? {
                        Some(current) => return Err(conflict(new.name(), None, Some(&current.reference))),
                        // Removed between our put and our read: try again.
                        None => continue,
                    }
                },
                Err(object_store::Error::NotImplemented) => {
                    warn!(reference = %new.name(), "backend lacks create-if-absent, falling back to check-then-put");
                    if let Some(current) = self.try_read(&path, new.name()).await? {
                        return Err(conflict(new.name(), None, Some(&current.reference)));
                    }
                    return self.set(new).await;
                },
                Err(e) => return Err(from_store(&what, e)),
            }
        }
    }

    async fn update(&self, new: &Reference, old: &Reference) -> Result<()> {
        let path = self.backend.ref_path(new.name());
        let record = Bytes::from(new.to_record());
        let what = format!("ref {}", new.name());
        let store = self.backend.store();

        loop {
            let Some(current) = self.try_read(&path, new.name()).await? else {
                return Err(conflict(new.name(), Some(old), None));
            };
            if current.reference != *old {
                return Err(conflict(new.name(), Some(old), Some(&current.reference)));
            }

            let put = bounded(self.backend.timeout(), async {
                Ok(store
                    .put_opts(
                        &path,
                        record.clone().into(),
                        PutMode::Update(current.version.clone()).into(),
                    )
                    .await)
            })
            .await?;

            match put {
                Ok(_) => return Ok(()),
                // Someone wrote in between; re-read and re-compare.
                Err(object_store::Error::Precondition { .. }) => continue,
                Err(object_store::Error::NotImplemented) => {
                    warn!(reference = %new.name(), "backend lacks conditional update, falling back to compare-then-put");
                    return self.set(new).await;
                },
                Err(e) => return Err(from_store(&what, e)),
            }
        }
    }

    /// Deletes a reference if the stored value equals `expected`.
    ///
    /// The comparison and the delete are two backend calls; a write landing
    /// between them is lost.
    pub async fn compare_and_remove(&self, expected: &Reference) -> Result<()> {
        let path = self.backend.ref_path(expected.name());
        match self.try_read(&path, expected.name()).await? {
            None => Err(conflict(expected.name(), Some(expected), None)),
            Some(current) if current.reference != *expected => Err(conflict(
                expected.name(),
                Some(expected),
                Some(&current.reference),
            )),
            Some(_) => self.remove(expected.name()).await,
        }
    }

    /// Deletes a reference; an absent one is success.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let path = self.backend.ref_path(name);
        let what = format!("ref {name}");
        let store = self.backend.store();
        bounded(self.backend.timeout(), async {
            match store.delete(&path).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
                Err(e) => Err(from_store(&what, e)),
            }
        })
        .await?;
        debug!(reference = %name, "reference removed");
        Ok(())
    }

    /// Lists `<base>/ref/` and reads every key.
    ///
    /// A record whose name differs from its key is skipped; such keys belong
    /// to some other layout sharing the prefix.
    pub fn iter(&self) -> BoxStream<'_, Result<Reference>> {
        let prefix = self.backend.refs_prefix();
        self.backend
            .store()
            .list(Some(&prefix))
            .map_err(|e| from_store("reference listing", e))
            .and_then(move |meta| {
                let expected = key_name(&prefix, &meta.location);
                async move {
                    let location = meta.location.to_string();
                    let reference = self.read_at(&meta.location, &location).await?.reference;
                    if expected.as_deref() == Some(reference.name()) {
                        Ok(Some(reference))
                    } else {
                        warn!(key = %location, reference = %reference.name(), "reference record does not match its key, skipped");
                        Ok(None)
                    }
                }
            })
            .try_filter_map(|reference| async move { Ok(reference) })
            .boxed()
    }
}

async fn decode(result: GetResult, what: &str) -> Result<Versioned> {
    let version = UpdateVersion {
        e_tag: result.meta.e_tag.clone(),
        version: result.meta.version.clone(),
    };
    let bytes = result.bytes().await.map_err(|e| from_store(what, e))?;
    let record = std::str::from_utf8(&bytes)
        .map_err(|_| Error::malformed("reference record", format!("{what} is not UTF-8")))?;
    Ok(Versioned {
        reference: Reference::from_record(record)?,
        version,
    })
}

/// Reference name encoded by a key under `prefix`.
fn key_name(prefix: &Path, location: &Path) -> Option<String> {
    let parts: Vec<String> = location
        .prefix_match(prefix)?
        .map(|part| part.as_ref().to_string())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

fn conflict(name: &str, expected: Option<&Reference>, actual: Option<&Reference>) -> Error {
    Error::conflict(
        name,
        expected.map_or_else(|| ABSENT.to_string(), Reference::to_record),
        actual.map(Reference::to_record),
    )
}
