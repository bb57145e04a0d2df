use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

/// Realm sent in Basic authentication challenges.
pub const REALM: &str = "bucketgit";

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or rejected credentials, or a policy denial.
    #[error("unauthorized")]
    Unauthorized,

    /// Undecodable request.
    #[error("{0}")]
    BadRequest(String),

    /// Browse target that does not exist.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

/// Failures while assembling the application state.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid settings: {0}")]
    Settings(#[from] config::ConfigError),

    #[error(transparent)]
    Storage(#[from] bucketgit_core::Error),
}

impl From<bucketgit_core::Error> for AppError {
    fn from(err: bucketgit_core::Error) -> Self {
        use bucketgit_core::Error;
        match err {
            Error::Malformed { .. } => AppError::BadRequest(err.to_string()),
            Error::Unauthorized(_) => AppError::Unauthorized,
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, format!("Basic realm=\"{REALM}\""))],
                "Unauthorized\n",
            )
                .into_response(),
            AppError::BadRequest(msg) => {
                warn!(error = %msg, "bad request");
                (StatusCode::BAD_REQUEST, format!("{msg}\n")).into_response()
            },
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, format!("{msg}\n")).into_response(),
            AppError::Internal(msg) => {
                error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{msg}\n")).into_response()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use bucketgit_core::Error;

    use super::*;

    fn status(err: Error) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_core_error_mapping() {
        assert_eq!(status(Error::malformed("pkt-line", "bad length")), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::unauthorized("denied")), StatusCode::UNAUTHORIZED);
        assert_eq!(status(Error::not_found("obj/abc")), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(Error::backend("put failed")), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(Error::Unsupported("index")), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(Error::Timeout { seconds: 30 }), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unauthorized_carries_challenge() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"bucketgit\""
        );
    }
}
