//! Read-only JSON browsing of the HEAD commit.

use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use bucketgit_core::object::{parse_commit, parse_tree};
use bucketgit_core::reference::HEAD;
use bucketgit_core::{Capability, Hash, ObjectKind};
use bucketgit_storage::GitStorage;
use tracing::{debug, instrument};

use crate::error::AppError;
use crate::extractors::BrowseView;
use crate::handlers::response::{CommitSummary, RepositoryIndex, TreeListing};
use crate::state::AppState;

/// Handler for `GET /`: repositories the anonymous user may browse.
#[instrument(skip_all)]
pub async fn repository_index(State(state): State<AppState>) -> Json<RepositoryIndex> {
    let snapshot = state.gate.snapshot();
    let repositories = snapshot
        .policy
        .repos_granting(state.gate.anonymous_user(), Capability::Browse)
        .into_iter()
        .map(str::to_string)
        .collect();
    Json(RepositoryIndex { repositories })
}

/// Renders a browse view of an already authorized repository.
pub async fn render(storage: &dyn GitStorage, view: BrowseView) -> Result<Response, AppError> {
    let head = head_commit(storage).await?;
    match view {
        BrowseView::Commit => {
            let commit = storage.object(&head, Some(ObjectKind::Commit)).await?;
            let info = parse_commit(commit.data())?;
            Ok(Json(CommitSummary::new(head, info)).into_response())
        },
        BrowseView::Tree(path) => tree_or_blob(storage, head, &path).await,
    }
}

async fn head_commit(storage: &dyn GitStorage) -> Result<Hash, AppError> {
    match storage.resolve(HEAD).await {
        Ok(id) => Ok(id),
        Err(e) if e.is_not_found() => Err(AppError::NotFound("repository is empty".to_string())),
        Err(e) => Err(e.into()),
    }
}

async fn tree_or_blob(storage: &dyn GitStorage, commit: Hash, path: &str) -> Result<Response, AppError> {
    let commit_object = storage.object(&commit, Some(ObjectKind::Commit)).await?;
    let mut tree = parse_commit(commit_object.data())?.tree;
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for (i, segment) in segments.iter().enumerate() {
        let entries = parse_tree(storage.object(&tree, Some(ObjectKind::Tree)).await?.data())?;
        let Some(entry) = entries.into_iter().find(|e| e.name == *segment) else {
            debug!(path = %path, "no such path");
            return Err(AppError::NotFound(format!("no such path: {path}")));
        };

        if entry.is_tree() {
            tree = entry.hash;
            continue;
        }
        if entry.is_submodule() || i + 1 != segments.len() {
            return Err(AppError::NotFound(format!("no such path: {path}")));
        }
        let blob = storage.object(&entry.hash, Some(ObjectKind::Blob)).await?;
        return Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            blob.data().clone(),
        )
            .into_response());
    }

    let entries = parse_tree(storage.object(&tree, Some(ObjectKind::Tree)).await?.data())?;
    Ok(Json(TreeListing::new(commit, &segments.join("/"), &entries)).into_response())
}
