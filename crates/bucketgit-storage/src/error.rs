//! Mapping of backend failures onto the shared error type.

use std::future::Future;
use std::time::Duration;

use bucketgit_core::{Error, Result};

/// Converts an `object_store` error into a storage error.
///
/// `what` names the thing being accessed ("object 3b18e5…", "ref refs/heads/main")
/// and is used for NotFound; other failures keep the backend error as source.
pub(crate) fn from_store(what: impl AsRef<str>, err: object_store::Error) -> Error {
    match err {
        object_store::Error::NotFound { .. } => Error::not_found(what.as_ref()),
        object_store::Error::NotImplemented => Error::Unsupported("backend operation"),
        other => Error::backend_with(what.as_ref(), other),
    }
}

/// Runs one backend call with the configured timeout.
///
/// Dropping the returned future drops the backend call as well.
pub(crate) async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            seconds: timeout.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_store_not_found() {
        let err = object_store::Error::NotFound {
            path: "repo/obj/abc".to_string(),
            source: "missing".into(),
        };
        let mapped = from_store("object abc", err);
        assert!(mapped.is_not_found());
        assert_eq!(mapped.to_string(), "not found: object abc");
    }

    #[test]
    fn test_from_store_generic_is_backend() {
        let err = object_store::Error::Generic {
            store: "S3",
            source: "connection reset".into(),
        };
        let mapped = from_store("get repo/config", err);
        assert!(mapped.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let result: Result<()> = bounded(Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout { seconds: 2 })));
    }

    #[tokio::test]
    async fn test_bounded_passes_through() {
        let result = bounded(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
