//! Cache of successful password checks.
//!
//! bcrypt is slow on purpose; a client pushing or fetching sends the same
//! credentials on every request of a session. Entries are keyed by user and
//! a SHA-1 digest of the supplied password, so plaintext never sits in the cache.

use std::time::Duration;

use moka::future::Cache;
use sha1::{Digest, Sha1};

use crate::metrics::GitMetrics;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CredentialKey {
    user: String,
    digest: [u8; 20],
}

impl CredentialKey {
    fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_string(),
            digest: Sha1::digest(password.as_bytes()).into(),
        }
    }
}

#[derive(Clone)]
pub struct CredentialCache {
    inner: Cache<CredentialKey, ()>,
    metrics: GitMetrics,
}

impl CredentialCache {
    pub fn new(ttl: Duration, max_capacity: u64, metrics: GitMetrics) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            metrics,
        }
    }

    /// Returns true if this user/password pair was verified recently.
    pub async fn contains(&self, user: &str, password: &str) -> bool {
        let hit = self.inner.contains_key(&CredentialKey::new(user, password));
        self.metrics.record_credential_lookup(hit);
        hit
    }

    pub async fn insert(&self, user: &str, password: &str) {
        self.inner.insert(CredentialKey::new(user, password), ()).await;
    }

    /// Forgets every verified pair.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate number of cached entries, after pending maintenance.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}
