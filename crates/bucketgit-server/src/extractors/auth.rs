//! HTTP Basic credentials.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::AppError;
use crate::gate::Credentials;

/// Credentials from the `Authorization` header, if any.
///
/// A header that is present but unreadable is rejected with a challenge so
/// the client asks for credentials again.
#[derive(Debug, Default)]
pub struct MaybeCredentials(pub Option<Credentials>);

impl<S> FromRequestParts<S> for MaybeCredentials
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(Self(None));
        };
        let value = value.to_str().map_err(|_| AppError::Unauthorized)?;
        parse_basic(value).map(|c| Self(Some(c))).ok_or(AppError::Unauthorized)
    }
}

fn parse_basic(value: &str) -> Option<Credentials> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    if user.is_empty() {
        return None;
    }
    Some(Credentials {
        user: user.to_string(),
        password: password.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(raw: &str) -> String {
        format!("Basic {}", STANDARD.encode(raw))
    }

    #[test]
    fn test_parse_basic() {
        let creds = parse_basic(&encode("alice:s3:cret")).unwrap();
        assert_eq!(creds.user, "alice");
        assert_eq!(creds.password, "s3:cret");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let value = encode("bob:pw").replacen("Basic", "bAsIc", 1);
        assert_eq!(parse_basic(&value).unwrap().user, "bob");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_basic("Bearer abc").is_none());
        assert!(parse_basic("Basic !!!").is_none());
        assert!(parse_basic(&encode("no-colon")).is_none());
        assert!(parse_basic(&encode(":empty-user")).is_none());
        assert!(parse_basic("Basic").is_none());
    }

    #[test]
    fn test_password_is_not_debug_printed() {
        let creds = parse_basic(&encode("alice:hunter2")).unwrap();
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
