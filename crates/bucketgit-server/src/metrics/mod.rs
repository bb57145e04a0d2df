//! Prometheus metrics for the bucketgit server.

pub mod git;
pub mod http;
pub mod setup;

pub use git::GitMetrics;
pub use setup::{detached_handle, init_metrics};
