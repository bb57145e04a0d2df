//! HTTP handlers.

pub mod browse;
pub mod git;
pub mod health;
pub mod metrics;
pub mod response;
