//! Lazy, deduplicated repository handles.
//!
//! A handle is created on first access to a path and shared by every later
//! caller. Initialization of a path happens at most once even when many
//! requests arrive together: the map holds one `OnceCell` per path and the
//! first caller to reach it runs the open/bootstrap sequence while the others wait.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bucketgit_core::{Error, Result};
use object_store::ObjectStore;
use object_store::path::Path;
use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::repository::{BucketRepository, RESERVED_SEGMENTS};

/// Shared handle to one repository's storage.
pub type RepositoryHandle = Arc<BucketRepository>;

type Slot = Arc<OnceCell<RepositoryHandle>>;

struct Entry {
    slot: Slot,
    last_used: AtomicU64,
}

/// Registry counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Handles currently cached.
    pub handles: usize,
    /// Handles opened since start (including re-opens after eviction).
    pub opened: u64,
    /// Repositories bootstrapped by this process.
    pub bootstrapped: u64,
    /// Idle handles evicted to respect the capacity.
    pub evicted: u64,
}

pub struct RepositoryRegistry {
    store: Arc<dyn ObjectStore>,
    prefix: Path,
    config: StorageConfig,
    entries: RwLock<HashMap<String, Entry>>,
    clock: AtomicU64,
    opened: AtomicU64,
    bootstrapped: AtomicU64,
    evicted: AtomicU64,
}

impl RepositoryRegistry {
    /// Creates a registry for the backend named by `config.url()`.
    pub fn new(config: StorageConfig) -> Result<Self> {
        let url = url::Url::parse(config.url())
            .map_err(|e| Error::malformed("storage url", format!("'{}': {e}", config.url())))?;
        let (store, prefix) = object_store::parse_url(&url)
            .map_err(|e| Error::backend_with(format!("open {url}"), e))?;
        info!(url = %url, prefix = %prefix, "storage backend ready");
        Ok(Self::with_store(Arc::from(store), prefix, config))
    }

    /// Creates a registry over an existing store.
    pub fn with_store(store: Arc<dyn ObjectStore>, prefix: Path, config: StorageConfig) -> Self {
        Self {
            store,
            prefix,
            config,
            entries: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            opened: AtomicU64::new(0),
            bootstrapped: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the handle for `path`, opening (and if needed bootstrapping) it on first use.
    pub async fn load(&self, path: &str) -> Result<RepositoryHandle> {
        let path = normalize(path)?;

        // Fast path: already initialized.
        let slot = {
            let entries = self.entries.read();
            entries.get(path).map(|entry| {
                entry.last_used.store(self.tick(), Ordering::Relaxed);
                Arc::clone(&entry.slot)
            })
        };
        if let Some(handle) = slot.as_ref().and_then(|slot| slot.get()) {
            return Ok(Arc::clone(handle));
        }

        // Slow path: find or insert the slot under the write lock.
        let slot = match slot {
            Some(slot) => slot,
            None => {
                let mut entries = self.entries.write();
                let entry = entries.entry(path.to_string()).or_insert_with(|| Entry {
                    slot: Arc::new(OnceCell::new()),
                    last_used: AtomicU64::new(0),
                });
                entry.last_used.store(self.tick(), Ordering::Relaxed);
                Arc::clone(&entry.slot)
            },
        };

        let handle = match slot.get_or_try_init(|| self.open(path)).await {
            Ok(handle) => Arc::clone(handle),
            Err(e) => {
                self.forget_failed(path, &slot);
                return Err(e);
            },
        };
        drop(slot);

        self.evict_idle();
        Ok(handle)
    }

    async fn open(&self, path: &str) -> Result<RepositoryHandle> {
        let repo = BucketRepository::new(
            Arc::clone(&self.store),
            &self.prefix,
            path,
            self.config.operation_timeout(),
        );
        let bootstrapped = repo.open(&self.config.default_branch_ref()).await?;

        self.opened.fetch_add(1, Ordering::Relaxed);
        if bootstrapped {
            self.bootstrapped.fetch_add(1, Ordering::Relaxed);
        }
        debug!(repo = %path, bootstrapped, "repository handle opened");
        Ok(Arc::new(repo))
    }

    /// Removes the slot a failed open left behind, unless a retry already filled or replaced it.
    fn forget_failed(&self, path: &str, slot: &Slot) {
        let mut entries = self.entries.write();
        let stale = entries
            .get(path)
            .is_some_and(|entry| Arc::ptr_eq(&entry.slot, slot) && !entry.slot.initialized());
        if stale {
            entries.remove(path);
            debug!(repo = %path, "repository open failed, slot released");
        }
    }

    /// Drops least recently used handles nobody holds until the cache fits.
    fn evict_idle(&self) {
        let Some(capacity) = self.config.registry_capacity() else {
            return;
        };
        let mut entries = self.entries.write();
        while entries.len() > capacity {
            let victim = entries
                .iter()
                .filter(|(_, entry)| is_idle(entry))
                .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                .map(|(path, _)| path.clone());
            match victim {
                Some(path) => {
                    entries.remove(&path);
                    self.evicted.fetch_add(1, Ordering::Relaxed);
                    debug!(repo = %path, "idle repository handle evicted");
                },
                // Everything is in use; stay over capacity rather than break sharing.
                None => break,
            }
        }
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            handles: self.len(),
            opened: self.opened.load(Ordering::Relaxed),
            bootstrapped: self.bootstrapped.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl std::fmt::Debug for RepositoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryRegistry")
            .field("prefix", &self.prefix.as_ref())
            .field("stats", &self.stats())
            .finish()
    }
}

/// An entry may go only when the map holds the sole reference to both the
/// slot and the handle inside it.
fn is_idle(entry: &Entry) -> bool {
    Arc::strong_count(&entry.slot) == 1
        && entry
            .slot
            .get()
            .is_some_and(|handle| Arc::strong_count(handle) == 1)
}

/// Trims surrounding slashes; rejects empty paths, `.`/`..` segments and
/// segments that name a repository's own keys, so one repository's prefix
/// never lies inside another's.
fn normalize(path: &str) -> Result<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(Error::malformed("repository path", "empty"));
    }
    if trimmed
        .split('/')
        .any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(Error::malformed("repository path", format!("'{path}'")));
    }
    if let Some(part) = trimmed
        .split('/')
        .find(|part| RESERVED_SEGMENTS.contains(part))
    {
        return Err(Error::malformed(
            "repository path",
            format!("'{path}' uses reserved segment '{part}'"),
        ));
    }
    Ok(trimmed)
}
