//! Unified API error handling with structured responses.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::auth::{AuthError, Rejection};
use crate::user::UserError;

/// API error type with structured responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The message is logged, never returned.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        let message = match &self {
            ApiError::Internal(msg) => {
                error!(error_code = code, message = %msg, "API error");
                "Internal server error".to_string()
            }
            _ => {
                let message = self.to_string();
                debug!(error_code = code, message = %message, "Client error");
                message
            }
        };

        let body = ErrorResponse {
            error: message,
            code,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

/// Untyped failures from the store or the password hasher are internal.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", err))
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::InvalidInput(msg) => ApiError::BadRequest(msg),
            err @ UserError::AlreadyRegistered(_) => ApiError::Conflict(err.to_string()),
            UserError::Internal(err) => err.into(),
        }
    }
}

/// Status comes from [`Rejection::status_code`]; the message is fixed.
impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        match rejection.status_code() {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized("Missing authorization".to_string()),
            _ => ApiError::Forbidden("Invalid or expired credential".to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential => Rejection::MissingCredential.into(),
            AuthError::MalformedCredential => Rejection::MalformedCredential.into(),
            AuthError::ExpiredOrInvalidSignature => Rejection::ExpiredOrInvalidSignature.into(),
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            AuthError::Misconfigured(err) => {
                ApiError::Internal(format!("Authentication misconfigured: {}", err))
            }
            AuthError::Internal(msg) => ApiError::Internal(format!("Authentication error: {}", msg)),
        }
    }
}

/// Unreadable JSON bodies get the same `{error, code}` shape as other errors.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
