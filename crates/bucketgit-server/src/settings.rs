//! Server settings.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. an optional TOML/YAML/JSON file (`BUCKETGIT_CONFIG`, default `bucketgit.toml`)
//! 3. environment variables `BUCKETGIT__<KEY>`, e.g. `BUCKETGIT__STORAGE_URL`

use std::net::SocketAddr;
use std::time::Duration;

use bucketgit_storage::StorageConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Environment variable naming the settings file.
pub const CONFIG_FILE_ENV: &str = "BUCKETGIT_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "bucketgit.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Any URL `object_store::parse_url` understands.
    pub storage_url: String,
    pub default_branch: String,
    pub operation_timeout_secs: u64,
    /// Cached repository handles; unbounded when absent.
    pub registry_capacity: Option<usize>,
    /// Repository holding the access policy.
    pub admin_repo: String,
    /// Identity granted everything on `admin_repo` until a policy is pushed.
    pub admin_user: String,
    pub admin_password: String,
    /// Identity used for requests without credentials.
    pub anonymous_user: String,
    /// Policy document path at the root of the admin repository.
    pub policy_file: String,
    pub credential_cache_ttl_secs: u64,
    pub credential_cache_capacity: u64,
    pub bcrypt_cost: u32,
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            storage_url: "memory:///".to_string(),
            default_branch: "main".to_string(),
            operation_timeout_secs: 30,
            registry_capacity: None,
            admin_repo: "admin".to_string(),
            admin_user: "admin".to_string(),
            admin_password: "admin".to_string(),
            anonymous_user: "nobody".to_string(),
            policy_file: "config.json".to_string(),
            credential_cache_ttl_secs: 300,
            credential_cache_capacity: 10_000,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            max_body_bytes: 256 * 1024 * 1024,
        }
    }
}

impl ServerSettings {
    /// Loads settings from defaults, the file named by `BUCKETGIT_CONFIG` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var(CONFIG_FILE_ENV).ok();
        Self::from_sources(file.as_deref().unwrap_or(DEFAULT_CONFIG_FILE), true)
    }

    /// Loads settings from defaults, `file` (skipped when absent) and, if
    /// `with_env`, the environment.
    pub fn from_sources(file: &str, with_env: bool) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name(file).required(false));
        if with_env {
            builder = builder.add_source(
                Environment::with_prefix("BUCKETGIT")
                    .separator("__")
                    .try_parsing(true),
            );
        }
        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Message(msg.to_string()));
        if self.admin_repo.trim_matches('/').is_empty() {
            return invalid("admin_repo must not be empty");
        }
        if self.anonymous_user.is_empty() {
            return invalid("anonymous_user must not be empty");
        }
        if self.operation_timeout_secs == 0 {
            return invalid("operation_timeout_secs must be positive");
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return invalid("bcrypt_cost must be between 4 and 31");
        }
        Ok(())
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Message(format!("invalid listen address: {e}")))
    }

    pub fn storage_config(&self) -> Result<StorageConfig, ConfigError> {
        let mut builder = StorageConfig::builder()
            .url(&self.storage_url)
            .default_branch(&self.default_branch)
            .operation_timeout(Duration::from_secs(self.operation_timeout_secs));
        if let Some(capacity) = self.registry_capacity {
            builder = builder.registry_capacity(capacity);
        }
        builder
            .build()
            .map_err(|e| ConfigError::Message(e.to_string()))
    }

    /// Full name of the branch the policy is read from.
    pub fn policy_branch_ref(&self) -> String {
        format!("refs/heads/{}", self.default_branch)
    }

    pub fn credential_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_cache_ttl_secs)
    }
}
