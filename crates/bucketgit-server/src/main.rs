//! bucketgit server binary.

use anyhow::Context;
use bucketgit_server::{AppState, ServerSettings, init_metrics, run_server_with_state};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = ServerSettings::load().context("failed to load settings")?;
    let addr = settings.addr()?;

    tracing::info!("Starting bucketgit server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Storage: {}", settings.storage_url);
    tracing::info!("Default branch: {}", settings.default_branch);

    let prometheus = init_metrics().context("failed to install metrics recorder")?;
    let state = AppState::from_settings(settings)
        .await
        .context("failed to initialize application state")?;

    run_server_with_state(addr, state, prometheus).await?;
    Ok(())
}
