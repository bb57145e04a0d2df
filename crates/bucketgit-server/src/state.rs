//! Application state.

use std::sync::Arc;

use bucketgit_storage::RepositoryRegistry;
use tracing::info;

use crate::error::StartupError;
use crate::gate::AccessGate;
use crate::metrics::GitMetrics;
use crate::settings::ServerSettings;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RepositoryRegistry>,
    pub gate: Arc<AccessGate>,
    pub settings: Arc<ServerSettings>,
    pub metrics: GitMetrics,
}

impl AppState {
    /// Opens the storage backend, builds the gate and loads the access policy.
    pub async fn from_settings(settings: ServerSettings) -> Result<Self, StartupError> {
        let registry = RepositoryRegistry::new(settings.storage_config()?)?;
        let metrics = GitMetrics::new();
        let gate = AccessGate::new(&settings, metrics.clone())?;

        let state = Self {
            registry: Arc::new(registry),
            gate: Arc::new(gate),
            settings: Arc::new(settings),
            metrics,
        };
        let version = state.gate.reload(&state.registry).await;
        info!(
            storage = %state.settings.storage_url,
            admin_repo = %state.settings.admin_repo,
            policy_version = version,
            "application state ready"
        );
        Ok(state)
    }

    /// Publishes the registry size gauge.
    pub fn observe_registry(&self) {
        self.metrics.update_registry_handles(self.registry.len());
    }
}
