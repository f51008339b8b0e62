//! Authentication errors.

use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::config::ConfigValidationError;
use crate::api::ApiError;

/// Errors raised while issuing credentials or authorizing requests.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No `Authorization` header on the request.
    #[error("missing credential")]
    MissingCredential,

    /// Header present but not `Bearer <token>`.
    #[error("malformed credential")]
    MalformedCredential,

    /// Token failed verification (bad signature, bad structure or expired).
    #[error("expired or invalid credential")]
    ExpiredOrInvalidSignature,

    /// Login with an unknown email or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No usable signing secret; fatal at startup.
    #[error("authentication is misconfigured: {0}")]
    Misconfigured(#[from] ConfigValidationError),

    #[error("internal authentication error: {0}")]
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
