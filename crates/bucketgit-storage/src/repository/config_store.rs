//! Per-repository config blob.

use bucketgit_core::{Error, RepositoryConfig, Result};
use bytes::Bytes;

use super::Backend;
use crate::error::{bounded, from_store};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    backend: Backend,
}

impl ConfigStore {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Reads `<base>/config`. A missing blob is an empty config.
    pub async fn get(&self) -> Result<RepositoryConfig> {
        let path = self.backend.config_path();
        let store = self.backend.store();
        let bytes = bounded(self.backend.timeout(), async {
            match store.get(&path).await {
                Ok(result) => result
                    .bytes()
                    .await
                    .map(Some)
                    .map_err(|e| from_store("config", e)),
                Err(object_store::Error::NotFound { .. }) => Ok(None),
                Err(e) => Err(from_store("config", e)),
            }
        })
        .await?;

        match bytes {
            None => Ok(RepositoryConfig::new()),
            Some(bytes) => {
                let text = std::str::from_utf8(&bytes)
                    .map_err(|_| Error::malformed("config", "not UTF-8"))?;
                RepositoryConfig::parse(text)
            },
        }
    }

    /// Serializes and overwrites `<base>/config`.
    pub async fn set(&self, config: &RepositoryConfig) -> Result<()> {
        let path = self.backend.config_path();
        let payload = Bytes::from(config.serialize());
        let store = self.backend.store();
        bounded(self.backend.timeout(), async {
            store
                .put(&path, payload.into())
                .await
                .map(|_| ())
                .map_err(|e| from_store("config", e))
        })
        .await
    }
}
