//! Test helpers for bucketgit-server.

#![allow(dead_code, unused_imports)]

pub mod client;
pub mod fixtures;

pub use client::{TestClient, TestResponse, client};
pub use fixtures::*;

use bucketgit_server::{AppState, ServerSettings, create_router_with_state, detached_handle};

pub const ADMIN_PASSWORD: &str = "s3cret";

/// Settings with a fresh in-memory backend and a cheap bcrypt cost.
pub fn settings() -> ServerSettings {
    ServerSettings {
        storage_url: "memory:///".to_string(),
        admin_password: ADMIN_PASSWORD.to_string(),
        bcrypt_cost: 4,
        ..ServerSettings::default()
    }
}

/// A full router over fresh state, plus the state for inspection.
pub async fn app() -> (TestClient, AppState) {
    let state = AppState::from_settings(settings()).await.unwrap();
    let router = create_router_with_state(state.clone(), detached_handle());
    (TestClient::new(router), state)
}
