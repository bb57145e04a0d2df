//! Error types for bucketgit.
//!
//! One error type is shared by the storage, protocol and server layers.
//! Storage errors travel unchanged up to the HTTP boundary, where the
//! variant decides what the client sees:
//!
//! - [`Error::Conflict`] is reported in-band, per reference, in a push response
//! - [`Error::Unauthorized`] becomes an authentication challenge
//! - everything else becomes a request failure
//!
//! # Example
//!
//! ```
//! use bucketgit_core::Error;
//!
//! let err = Error::not_found("object 3b18e512dba79e4c8300dd08aeb37f8e728b8dad");
//! assert!(err.is_not_found());
//! assert!(!err.is_transient());
//! ```

use thiserror::Error;

/// Boxed error used to carry backend failures without tying this crate to a backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for bucketgit operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A missing object, reference or config key.
    #[error("not found: {0}")]
    NotFound(String),

    /// A reference compare-and-swap saw a value other than the expected one.
    #[error(
        "reference '{name}' changed: expected {expected}, found {}",
        actual.as_deref().unwrap_or("<absent>")
    )]
    Conflict {
        /// Reference name
        name: String,
        /// Serialized value the caller expected (or `<absent>`)
        expected: String,
        /// Serialized value currently stored, if any
        actual: Option<String>,
    },

    /// Failed credential check or policy denial.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Protocol or storage record decode failure.
    #[error("malformed {what}: {reason}")]
    Malformed {
        /// What was being decoded (pkt-line, pack, reference record, ...)
        what: &'static str,
        /// Description of the failure
        reason: String,
    },

    /// Storage I/O failure, transient or permanent.
    #[error("storage backend error: {message}")]
    Backend {
        /// Short description of the failed operation
        message: String,
        /// Underlying backend error
        #[source]
        cause: Option<BoxError>,
    },

    /// A backend call did not finish within the configured timeout.
    #[error("operation timed out after {seconds}s")]
    Timeout {
        /// Configured timeout in seconds
        seconds: u64,
    },

    /// Optional storage capability not implemented.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// I/O error while encoding or decoding a stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a NotFound error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Creates a Conflict error.
    pub fn conflict(
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: Option<String>,
    ) -> Self {
        Self::Conflict {
            name: name.into(),
            expected: expected.into(),
            actual,
        }
    }

    /// Creates an Unauthorized error.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }

    /// Creates a Malformed error.
    pub fn malformed(what: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            reason: reason.into(),
        }
    }

    /// Creates a Backend error without an underlying cause.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a Backend error wrapping the backend's own error.
    pub fn backend_with(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Returns true if this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a Conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if this is an Unauthorized error.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Returns true if this is a Malformed error.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }

    /// Returns true if this is an Unsupported error.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Returns true if a later attempt of the same operation might succeed.
    ///
    /// Nothing in bucketgit retries automatically; this only informs logging
    /// and the status code chosen at the HTTP boundary.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend { .. } | Self::Timeout { .. })
    }
}
