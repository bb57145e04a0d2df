//! bucketgit server - Git smart HTTP over object storage
//!
//! Serves fetch and push for any number of repositories kept in one
//! object-storage bucket, with an access policy that lives in a Git
//! repository of its own.

pub mod error;
pub mod extractors;
pub mod gate;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod settings;
pub mod state;

pub use error::{AppError, StartupError};
pub use gate::{AccessGate, Credentials, PolicySnapshot};
pub use metrics::{GitMetrics, detached_handle, init_metrics};
pub use server::{create_router, create_router_with_state, run_server_with_state};
pub use settings::ServerSettings;
pub use state::AppState;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
