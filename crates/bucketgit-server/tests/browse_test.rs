mod helpers;

use axum::http::StatusCode;
use bucketgit_core::{AccessPolicy, Capability};
use helpers::*;

/// A repository `docs` with one commit, pushable by alice and browsable by anyone.
async fn docs() -> (TestClient, bucketgit_server::AppState, Snapshot) {
    let (client, state) = app().await;
    let mut policy = policy_with("alice", "pw", "docs", &[Capability::Push]);
    policy.grant("docs", "nobody", [Capability::Browse]);
    state.gate.replace(policy);

    let commit = snapshot(&[("README.md", "# docs\n"), ("guide.md", "read me\n")], "add docs", None);
    client
        .post(
            "/docs/git-receive-pack",
            Some(("alice", "pw")),
            vec![],
            push_body(None, commit.id(), "refs/heads/main", &commit.objects),
        )
        .await
        .assert_status(StatusCode::OK);
    (client, state, commit)
}

#[tokio::test]
async fn index_lists_browsable_repositories() {
    let (client, state) = app().await;
    let mut policy = AccessPolicy::new();
    policy.grant("b", "nobody", [Capability::Browse]);
    policy.grant("a", "nobody", [Capability::Browse, Capability::Fetch]);
    policy.grant("hidden", "nobody", [Capability::Fetch]);
    state.gate.replace(policy);

    let response = client.get("/").await;
    response
        .assert_status(StatusCode::OK)
        .assert_content_type_contains("application/json");
    let index: serde_json::Value = response.json();
    assert_eq!(index["repositories"], serde_json::json!(["a", "b"]));
}

#[tokio::test]
async fn root_tree_listing() {
    let (client, _, commit) = docs().await;

    let response = client.get("/docs").await;
    response.assert_status(StatusCode::OK);
    let listing: serde_json::Value = response.json();
    assert_eq!(listing["commit"], commit.id().to_string());
    assert_eq!(listing["path"], "");
    assert_eq!(listing["dirs"], serde_json::json!([]));
    let names: Vec<&str> = listing["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["README.md", "guide.md"]);
    assert_eq!(listing["files"][0]["mode"], "100644");
}

#[tokio::test]
async fn blob_is_served_raw() {
    let (client, _, _) = docs().await;

    let response = client.get("/docs/blob/guide.md").await;
    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "application/octet-stream");
    assert_eq!(response.body, b"read me\n");
}

#[tokio::test]
async fn commit_summary() {
    let (client, _, commit) = docs().await;

    let response = client.get("/docs/commit/whatever").await;
    response.assert_status(StatusCode::OK);
    let summary: serde_json::Value = response.json();
    assert_eq!(summary["id"], commit.id().to_string());
    assert_eq!(summary["message"], "add docs\n");
    assert_eq!(summary["parents"], serde_json::json!([]));
}

#[tokio::test]
async fn missing_path_is_not_found() {
    let (client, _, _) = docs().await;
    client
        .get("/docs/blob/nope.md")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    client
        .get("/docs/blob/README.md/deeper")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_repository_is_not_found() {
    let (client, state) = app().await;
    let mut policy = AccessPolicy::new();
    policy.grant("empty", "nobody", [Capability::Browse]);
    state.gate.replace(policy);

    client.get("/empty").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn browsing_requires_the_browse_capability() {
    let (client, _, _) = docs().await;
    client
        .get_as("/docs", "alice", "pw")
        .await
        .assert_challenged();
}
