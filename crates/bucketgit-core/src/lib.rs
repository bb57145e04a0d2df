//! bucketgit core - Domain types
//!
//! This crate provides the types shared by the storage, protocol and server
//! crates: object ids and objects, references, repository configuration,
//! the access policy and the common error type.

pub mod access;
pub mod config;
pub mod error;
pub mod hash;
pub mod object;
pub mod reference;

pub use access::{AccessPolicy, Capability, Endpoint};
pub use config::RepositoryConfig;
pub use error::{BoxError, Error, Result};
pub use hash::Hash;
pub use object::{EncodedObject, ObjectKind};
pub use reference::{RefTarget, Reference};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_semver() {
        let v = version();
        assert_eq!(v.split('.').count(), 3, "Version should be semver");
    }
}
