//! Credential extraction for job submission.
//!
//! The server only checks that credentials are present; the token value is
//! never validated.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};

use crate::error::Error;

/// Token taken from the `Authorization` header.
///
/// A `Bearer ` prefix is stripped when present; any other non-empty value is
/// accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken(pub String);

impl AuthToken {
    /// The token value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_header(value: &str) -> Option<Self> {
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        (!token.is_empty()).then(|| Self(token.to_string()))
    }
}

impl<S> FromRequestParts<S> for AuthToken
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(AuthToken::from_header)
            .ok_or(Error::Unauthenticated)
    }
}
