//! Content-addressed object storage.

use bucketgit_core::hash::{self, Hash};
use bucketgit_core::object::{decode_envelope, encode_envelope, read_envelope_header};
use bucketgit_core::{EncodedObject, Error, ObjectKind, Result};
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use object_store::PutMode;
use object_store::path::Path;
use tracing::{debug, warn};

use super::Backend;
use crate::error::{bounded, from_store};

/// Bytes fetched to decode an envelope header without reading the body.
const HEADER_PROBE_LEN: u64 = 512;

/// Reads and writes loose-object envelopes under `<base>/obj/<hex>`.
#[derive(Debug, Clone)]
pub struct ObjectStoreAdapter {
    backend: Backend,
}

impl ObjectStoreAdapter {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    fn path(&self, id: &Hash) -> Path {
        self.backend.objects_prefix().child(id.to_string())
    }

    /// Writes an object under its computed id.
    ///
    /// Uses create-if-absent; an existing key is success since its content
    /// is identical by construction. Backends without conditional create
    /// get a plain overwrite.
    pub async fn put(&self, object: &EncodedObject) -> Result<Hash> {
        let id = object.hash();
        let path = self.path(&id);
        let envelope = Bytes::from(encode_envelope(object)?);
        let what = format!("object {id}");
        let store = self.backend.store();

        let created = bounded(self.backend.timeout(), async {
            match store
                .put_opts(&path, envelope.clone().into(), PutMode::Create.into())
                .await
            {
                Ok(_) => Ok(true),
                Err(object_store::Error::AlreadyExists { .. }) => Ok(false),
                Err(object_store::Error::NotImplemented) => {
                    store
                        .put(&path, envelope.clone().into())
                        .await
                        .map_err(|e| from_store(&what, e))?;
                    Ok(true)
                },
                Err(e) => Err(from_store(&what, e)),
            }
        })
        .await?;

        if created {
            debug!(object = %id, kind = %object.kind(), size = object.size(), "object stored");
        }
        Ok(id)
    }

    /// Reads an object and checks that its content matches its key.
    pub async fn get(&self, id: &Hash, expected: Option<ObjectKind>) -> Result<EncodedObject> {
        let object = self.read_at(&self.path(id), id).await?;
        match expected {
            Some(kind) if kind != object.kind() => Err(Error::not_found(format!(
                "{kind} {id} (stored object is a {})",
                object.kind()
            ))),
            _ => Ok(object),
        }
    }

    async fn read_at(&self, path: &Path, id: &Hash) -> Result<EncodedObject> {
        let what = format!("object {id}");
        let store = self.backend.store();
        let envelope = bounded(self.backend.timeout(), async {
            let result = store.get(path).await.map_err(|e| from_store(&what, e))?;
            result.bytes().await.map_err(|e| from_store(&what, e))
        })
        .await?;

        let object = decode_envelope(&envelope)?;
        if object.hash() != *id {
            warn!(key = %id, actual = %object.hash(), "stored object does not match its key");
            return Err(Error::malformed(
                "stored object",
                format!("key {id} holds content hashing to {}", object.hash()),
            ));
        }
        Ok(object)
    }

    /// Metadata-only existence probe.
    pub async fn has(&self, id: &Hash) -> Result<bool> {
        let path = self.path(id);
        let store = self.backend.store();
        bounded(self.backend.timeout(), async {
            match store.head(&path).await {
                Ok(_) => Ok(true),
                Err(object_store::Error::NotFound { .. }) => Ok(false),
                Err(e) => Err(from_store(format!("object {id}"), e)),
            }
        })
        .await
    }

    /// Returns the content size by decoding only the envelope header.
    pub async fn size(&self, id: &Hash) -> Result<u64> {
        let path = self.path(id);
        let what = format!("object {id}");
        let store = self.backend.store();
        let prefix = bounded(self.backend.timeout(), async {
            let meta = store.head(&path).await.map_err(|e| from_store(&what, e))?;
            let len = meta.size.min(HEADER_PROBE_LEN);
            store
                .get_range(&path, 0..len)
                .await
                .map_err(|e| from_store(&what, e))
        })
        .await?;

        let (_, size) = read_envelope_header(&prefix)?;
        Ok(size)
    }

    /// Lists every object key and reads each one.
    pub fn iter(&self, kind: Option<ObjectKind>) -> BoxStream<'_, Result<EncodedObject>> {
        let prefix = self.backend.objects_prefix();
        self.backend
            .store()
            .list(Some(&prefix))
            .map_err(|e| from_store("object listing", e))
            .and_then(move |meta| async move {
                let name = meta
                    .location
                    .filename()
                    .ok_or_else(|| Error::malformed("object key", meta.location.to_string()))?;
                let id = hash::parse_hex(name)?;
                self.read_at(&meta.location, &id).await
            })
            .try_filter(move |object| {
                futures::future::ready(kind.is_none_or(|k| object.kind() == k))
            })
            .boxed()
    }
}
