//! Storage backend configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the object-storage backend and the repository registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Backend URL, anything `object_store::parse_url` understands
    /// (`memory:///`, `file:///srv/git`, `s3://bucket/prefix`).
    url: String,

    /// Branch HEAD points at when a repository is bootstrapped.
    #[serde(default = "default_branch")]
    default_branch: String,

    /// Upper bound for every single backend call.
    #[serde(default = "default_operation_timeout", with = "duration_secs")]
    operation_timeout: Duration,

    /// Maximum number of cached repository handles. `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    registry_capacity: Option<usize>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(30)
}

impl StorageConfig {
    /// Creates a new builder for StorageConfig.
    pub fn builder() -> StorageConfigBuilder {
        StorageConfigBuilder::default()
    }

    /// Returns the backend URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the branch used when bootstrapping repositories.
    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    /// Returns the full ref name of the default branch.
    pub fn default_branch_ref(&self) -> String {
        format!("refs/heads/{}", self.default_branch)
    }

    /// Returns the per-call timeout.
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Returns the registry capacity, if bounded.
    pub fn registry_capacity(&self) -> Option<usize> {
        self.registry_capacity
    }
}

/// Builder for StorageConfig.
#[derive(Debug, Default)]
pub struct StorageConfigBuilder {
    url: Option<String>,
    default_branch: Option<String>,
    operation_timeout: Option<Duration>,
    registry_capacity: Option<usize>,
}

impl StorageConfigBuilder {
    /// Sets the backend URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the default branch name (without `refs/heads/`).
    pub fn default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = Some(branch.into());
        self
    }

    /// Sets the per-call timeout.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Bounds the number of cached repository handles.
    pub fn registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = Some(capacity);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is missing or a value is out of range.
    pub fn build(self) -> Result<StorageConfig, &'static str> {
        let url = self.url.ok_or("url is required")?;
        let default_branch = self.default_branch.unwrap_or_else(default_branch);
        if default_branch.is_empty() || default_branch.contains(char::is_whitespace) {
            return Err("default_branch must be a non-empty name without whitespace");
        }
        let operation_timeout = self
            .operation_timeout
            .unwrap_or_else(default_operation_timeout);
        if operation_timeout.is_zero() {
            return Err("operation_timeout must be greater than zero");
        }
        if self.registry_capacity == Some(0) {
            return Err("registry_capacity must be greater than zero");
        }

        Ok(StorageConfig {
            url,
            default_branch,
            operation_timeout,
            registry_capacity: self.registry_capacity,
        })
    }
}

mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
