//! Metrics setup and initialization.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

use super::git::register_git_metrics;
use super::http::register_http_metrics;

/// Histogram buckets in seconds. Pack transfers run far longer than
/// ordinary requests, hence the long tail.
const BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Installs the global Prometheus recorder and returns the handle that
/// renders `/metrics`.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(BUCKETS)?
        .install_recorder()?;
    register_http_metrics();
    register_git_metrics();
    info!("Metrics system initialized");
    Ok(handle)
}

/// A handle backed by a recorder that is not installed globally.
///
/// Used where several routers live in one process, as in tests.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}
