//! Access control gate.
//!
//! Authentication maps a request to a user name: HTTP Basic credentials are
//! checked against the bcrypt hash in the policy, and a request without
//! credentials runs as the anonymous user. Authorization then asks the
//! current policy snapshot about the resulting [`Endpoint`].
//!
//! The snapshot is immutable and versioned. A reload builds a new one and
//! swaps it in under a short write lock; readers clone the `Arc` and never
//! block each other. Reloads run one at a time, so a slow read of an older
//! document cannot land after a newer one.

mod credentials;
mod loader;

use std::sync::Arc;

use bucketgit_core::{AccessPolicy, Capability, Endpoint, Error, Result};
use bucketgit_storage::RepositoryRegistry;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use credentials::CredentialCache;
pub use loader::load_policy;

use crate::metrics::GitMetrics;
use crate::settings::ServerSettings;

/// HTTP Basic credentials as sent by the client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// One immutable version of the access policy.
#[derive(Debug)]
pub struct PolicySnapshot {
    pub version: u64,
    pub policy: AccessPolicy,
    /// True while no policy document has been loaded.
    pub bootstrap: bool,
}

pub struct AccessGate {
    snapshot: RwLock<Arc<PolicySnapshot>>,
    reload_lock: Mutex<()>,
    credentials: CredentialCache,
    bootstrap: AccessPolicy,
    anonymous_user: String,
    admin_repo: String,
    policy_branch_ref: String,
    policy_file: String,
    metrics: GitMetrics,
}

impl AccessGate {
    /// Creates a gate holding the bootstrap policy.
    ///
    /// Hashes the configured administrative password, which takes a
    /// noticeable moment at the default bcrypt cost.
    pub fn new(settings: &ServerSettings, metrics: GitMetrics) -> Result<Self> {
        let hash = bcrypt::hash(&settings.admin_password, settings.bcrypt_cost)
            .map_err(|e| Error::backend_with("hash administrative password", e))?;
        let bootstrap = AccessPolicy::bootstrap(&settings.admin_repo, &settings.admin_user, hash);

        Ok(Self {
            snapshot: RwLock::new(Arc::new(PolicySnapshot {
                version: 0,
                policy: bootstrap.clone(),
                bootstrap: true,
            })),
            reload_lock: Mutex::new(()),
            credentials: CredentialCache::new(
                settings.credential_cache_ttl(),
                settings.credential_cache_capacity,
                metrics.clone(),
            ),
            bootstrap,
            anonymous_user: settings.anonymous_user.clone(),
            admin_repo: settings.admin_repo.clone(),
            policy_branch_ref: settings.policy_branch_ref(),
            policy_file: settings.policy_file.clone(),
            metrics,
        })
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn anonymous_user(&self) -> &str {
        &self.anonymous_user
    }

    pub fn admin_repo(&self) -> &str {
        &self.admin_repo
    }

    /// Resolves the request identity. Unknown users and wrong passwords are Unauthorized.
    pub async fn authenticate(&self, credentials: Option<&Credentials>) -> Result<String> {
        let Some(credentials) = credentials else {
            return Ok(self.anonymous_user.clone());
        };
        let Credentials { user, password } = credentials;

        let snapshot = self.snapshot();
        let Some(hash) = snapshot.policy.password_hash(user) else {
            debug!(user = %user, "unknown user");
            return Err(Error::unauthorized(format!("unknown user '{user}'")));
        };

        if self.credentials.contains(user, password).await {
            return Ok(user.clone());
        }

        let (hash, candidate) = (hash.to_string(), password.clone());
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &hash))
            .await
            .map_err(|e| Error::backend_with("password verification task", e))?;

        match verified {
            Ok(true) => {
                // A reload during verification clears the cache; do not refill it from a stale policy.
                if self.snapshot.read().version == snapshot.version {
                    self.credentials.insert(user, password).await;
                }
                Ok(user.clone())
            },
            Ok(false) => Err(Error::unauthorized(format!("wrong password for '{user}'"))),
            Err(e) => {
                warn!(user = %user, error = %e, "stored password hash is unusable");
                Err(Error::unauthorized(format!("unusable password hash for '{user}'")))
            },
        }
    }

    /// Asks the current snapshot whether the endpoint is allowed.
    pub fn authorize(&self, endpoint: &Endpoint) -> bool {
        self.snapshot.read().policy.authorize(endpoint)
    }

    /// Authenticates and authorizes in one step.
    pub async fn check(
        &self,
        credentials: Option<&Credentials>,
        repo_path: &str,
        capability: Capability,
    ) -> Result<Endpoint> {
        let user = self.authenticate(credentials).await?;
        let endpoint = Endpoint::new(user, repo_path, capability);
        if !self.authorize(&endpoint) {
            debug!(endpoint = %endpoint, "denied");
            return Err(Error::unauthorized(format!("{endpoint} denied")));
        }
        Ok(endpoint)
    }

    /// Installs a new policy and returns its version.
    pub fn replace(&self, policy: AccessPolicy) -> u64 {
        self.install(policy, false)
    }

    fn install(&self, policy: AccessPolicy, bootstrap: bool) -> u64 {
        let version = {
            let mut current = self.snapshot.write();
            let version = current.version + 1;
            *current = Arc::new(PolicySnapshot {
                version,
                policy,
                bootstrap,
            });
            version
        };
        self.credentials.clear();
        version
    }

    /// Re-reads the policy document from the administrative repository.
    ///
    /// A missing branch or file restores the bootstrap policy. A failed read
    /// or an undecodable document leaves the current snapshot in place.
    /// Returns the version in force afterwards.
    pub async fn reload(&self, registry: &RepositoryRegistry) -> u64 {
        let _serial = self.reload_lock.lock().await;
        let loaded = match registry.load(&self.admin_repo).await {
            Ok(repo) => load_policy(repo.as_ref(), &self.policy_branch_ref, &self.policy_file).await,
            Err(e) => Err(e),
        };

        match loaded {
            Ok(Some(policy)) => {
                let version = self.replace(policy);
                self.metrics.record_policy_reload("ok");
                info!(version, "access policy loaded");
                version
            },
            Ok(None) => {
                let version = self.install(self.bootstrap.clone(), true);
                self.metrics.record_policy_reload("bootstrap");
                info!(version, "no policy document, using bootstrap policy");
                version
            },
            Err(e) => {
                self.metrics.record_policy_reload("error");
                let version = self.snapshot.read().version;
                warn!(error = %e, version, "policy reload failed, keeping current policy");
                version
            },
        }
    }

    /// Entries in the credential cache.
    pub async fn cached_credentials(&self) -> u64 {
        self.credentials.entry_count().await
    }
}
