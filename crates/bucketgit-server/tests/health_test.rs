mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;
use bucketgit_server::create_router;
use bucketgit_server::handlers::health::HealthResponse;

#[tokio::test]
async fn health_check_returns_200() {
    let app = create_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_check_body_contains_status_up() {
    let response = helpers::client().get("/health").await;

    response
        .assert_status(StatusCode::OK)
        .assert_content_type_contains("application/json");
    let health: serde_json::Value = response.json();
    assert_eq!(health["status"], "UP");
}

#[tokio::test]
async fn health_is_not_shadowed_by_repository_routes() {
    let (client, state) = helpers::app().await;

    let response = client.get("/health").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.text(), r#"{"status":"UP"}"#);
    assert_eq!(state.registry.len(), 0);
}

#[tokio::test]
async fn metrics_endpoint_renders() {
    let (client, _) = helpers::app().await;
    client.get("/metrics").await.assert_status(StatusCode::OK);
}

#[test]
fn health_response_serializes_correctly() {
    let response = HealthResponse::default();
    let json = serde_json::to_string(&response).unwrap();

    assert_eq!(json, r#"{"status":"UP"}"#);
}
