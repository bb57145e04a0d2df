//! Smart-HTTP handlers.
//!
//! Every request is classified, authorized and only then allowed to touch
//! the registry, so a denied request cannot tell whether the repository exists.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use bucketgit_protocol::{Service, advertise, decode_body, receive_pack, upload_pack};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::extractors::{MaybeCredentials, RepoRoute, ServiceQuery};
use crate::handlers::browse;
use crate::state::AppState;

/// Handler for `GET /{*path}`: ref advertisement or browsing.
#[instrument(skip_all, fields(path = %path))]
pub async fn git_get(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<ServiceQuery>,
    MaybeCredentials(credentials): MaybeCredentials,
) -> Result<Response, AppError> {
    let route = RepoRoute::for_get(&path, query.service.as_deref())?;
    let endpoint = state
        .gate
        .check(credentials.as_ref(), route.repo(), route.capability())
        .await?;
    let repo = state.registry.load(route.repo()).await?;
    state.observe_registry();

    match route {
        RepoRoute::Advertise { service, .. } => {
            let body = advertise(repo.as_ref(), service).await?;
            info!(user = %endpoint.user, service = %service, "refs advertised");
            Ok(git_response(service.advertisement_content_type(), body))
        },
        RepoRoute::Browse { view, .. } => browse::render(repo.as_ref(), view).await,
        RepoRoute::Rpc { .. } => Err(AppError::NotFound(format!("no such endpoint: /{path}"))),
    }
}

/// Handler for `POST /{*path}`: upload-pack and receive-pack.
#[instrument(skip_all, fields(path = %path))]
pub async fn git_post(
    State(state): State<AppState>,
    Path(path): Path<String>,
    MaybeCredentials(credentials): MaybeCredentials,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let route = RepoRoute::for_post(&path)?;
    let endpoint = state
        .gate
        .check(credentials.as_ref(), route.repo(), route.capability())
        .await?;
    let RepoRoute::Rpc { repo: repo_path, service } = route else {
        return Err(AppError::NotFound(format!("no such endpoint: /{path}")));
    };
    let repo = state.registry.load(&repo_path).await?;
    state.observe_registry();

    let encoding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok());
    let body = decode_body(encoding, &body, state.settings.max_body_bytes)?;

    match service {
        Service::UploadPack => {
            let outcome = upload_pack(repo.as_ref(), &body).await?;
            state.metrics.record_fetch(outcome.objects_sent);
            info!(user = %endpoint.user, objects = outcome.objects_sent, "fetch served");
            Ok(git_response(service.result_content_type(), outcome.response))
        },
        Service::ReceivePack => {
            let report = receive_pack(repo.as_ref(), &body).await?;
            let (accepted, rejected) = (report.accepted(), report.rejected());
            state
                .metrics
                .record_push(accepted, rejected, report.objects_written);
            info!(
                user = %endpoint.user,
                accepted,
                rejected,
                objects = report.objects_written,
                "push processed"
            );

            if repo_path == state.gate.admin_repo() && accepted > 0 {
                state.gate.reload(&state.registry).await;
            }
            Ok(git_response(service.result_content_type(), report.response))
        },
    }
}

fn git_response(content_type: String, body: Bytes) -> Response {
    let content_type = HeaderValue::from_str(&content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        body,
    )
        .into_response()
}
