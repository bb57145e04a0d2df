//! Object-storage backed repositories.

mod bucket;
mod config_store;
mod objects;
mod refs;

use std::sync::Arc;
use std::time::Duration;

use object_store::ObjectStore;
use object_store::path::Path;

pub use bucket::BucketRepository;
pub use config_store::ConfigStore;
pub use objects::ObjectStoreAdapter;
pub use refs::ReferenceStore;

const OBJECT_INFIX: &str = "obj";
const REF_INFIX: &str = "ref";
const CONFIG_KEY: &str = "config";

/// Path segments a repository path may not contain.
pub(crate) const RESERVED_SEGMENTS: [&str; 3] = [OBJECT_INFIX, REF_INFIX, CONFIG_KEY];

/// A backend store rooted at one repository's base path.
#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn ObjectStore>,
    base: Path,
    timeout: Duration,
}

impl Backend {
    /// Creates a backend rooted at `base`.
    pub fn new(store: Arc<dyn ObjectStore>, base: Path, timeout: Duration) -> Self {
        Self {
            store,
            base,
            timeout,
        }
    }

    /// Returns the repository base path.
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub(crate) fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    fn objects_prefix(&self) -> Path {
        self.base.child(OBJECT_INFIX)
    }

    fn refs_prefix(&self) -> Path {
        self.base.child(REF_INFIX)
    }

    fn config_path(&self) -> Path {
        self.base.child(CONFIG_KEY)
    }

    /// `<base>/ref/refs/heads/main`; each `/`-separated component becomes a path segment.
    fn ref_path(&self, name: &str) -> Path {
        name.split('/')
            .fold(self.refs_prefix(), |path, part| path.child(part))
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("store", &self.store.to_string())
            .field("base", &self.base.as_ref())
            .field("timeout", &self.timeout)
            .finish()
    }
}
