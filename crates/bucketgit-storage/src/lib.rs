//! # bucketgit storage
//!
//! Git repositories on an object-storage backend (S3, local filesystem or
//! in-memory, through `object_store`).
//!
//! Per repository base path the key layout is:
//!
//! - `<base>/obj/<hex id>`: zlib loose-object envelope, written create-if-absent
//! - `<base>/ref/<ref name>`: `"<target> <name>"` record, updated by compare-and-swap
//! - `<base>/config`: Git config text
//!
//! ## Example
//!
//! ```ignore
//! use bucketgit_storage::{GitStorage, RepositoryRegistry, StorageConfig};
//!
//! let config = StorageConfig::builder()
//!     .url("s3://my-bucket/git")
//!     .default_branch("main")
//!     .build()?;
//!
//! let registry = RepositoryRegistry::new(config)?;
//! let repo = registry.load("team/app").await?;
//! let head = repo.resolve("HEAD").await?;
//! ```

pub mod config;
mod error;
pub mod registry;
pub mod repository;
pub mod storage;

// Re-exports
pub use config::{StorageConfig, StorageConfigBuilder};
pub use registry::{RegistryStats, RepositoryHandle, RepositoryRegistry};
pub use repository::{Backend, BucketRepository, ConfigStore, ObjectStoreAdapter, ReferenceStore};
pub use storage::GitStorage;

// Re-export bucketgit_core for consumers
pub use bucketgit_core;
