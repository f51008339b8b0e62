//! Request authorization decision.
//!
//! [`authorize`] looks at the `Authorization` header only. Every failure is
//! returned as a [`Rejection`]; nothing here panics or touches storage.

use axum::http::{HeaderMap, Request, StatusCode, header};
use tracing::debug;

use super::AuthError;
use super::claims::ClaimSet;
use super::codec::{TokenCodec, now_unix};

const BEARER_SCHEME: &str = "Bearer";

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingCredential,
    MalformedCredential,
    ExpiredOrInvalidSignature,
}

impl Rejection {
    /// HTTP status returned to the client.
    pub fn status_code(self) -> StatusCode {
        match self {
            Rejection::MissingCredential => StatusCode::UNAUTHORIZED,
            Rejection::MalformedCredential | Rejection::ExpiredOrInvalidSignature => {
                StatusCode::FORBIDDEN
            }
        }
    }
}

impl From<Rejection> for AuthError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::MissingCredential => AuthError::MissingCredential,
            Rejection::MalformedCredential => AuthError::MalformedCredential,
            Rejection::ExpiredOrInvalidSignature => AuthError::ExpiredOrInvalidSignature,
        }
    }
}

/// Result of authorizing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    Authorized(ClaimSet),
    Rejected(Rejection),
}

impl AuthorizationOutcome {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationOutcome::Authorized(_))
    }

    pub fn into_result(self) -> Result<ClaimSet, AuthError> {
        match self {
            AuthorizationOutcome::Authorized(claims) => Ok(claims),
            AuthorizationOutcome::Rejected(rejection) => Err(rejection.into()),
        }
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, Rejection> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(Rejection::MissingCredential)?;
    let value = value
        .to_str()
        .map_err(|_| Rejection::MalformedCredential)?
        .trim();

    let (scheme, token) = match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) => (scheme, rest.trim()),
        None => (value, ""),
    };

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME)
        || token.is_empty()
        || token.contains(char::is_whitespace)
    {
        return Err(Rejection::MalformedCredential);
    }

    Ok(token)
}

/// Authorize a request by its headers against the current time.
pub fn authorize(headers: &HeaderMap, codec: &TokenCodec) -> AuthorizationOutcome {
    authorize_at(headers, codec, now_unix())
}

/// Authorize a request by its headers as if the current time were `now`.
pub fn authorize_at(headers: &HeaderMap, codec: &TokenCodec, now: i64) -> AuthorizationOutcome {
    let token = match extract_bearer(headers) {
        Ok(token) => token,
        Err(rejection) => {
            debug!(?rejection, "request rejected before verification");
            return AuthorizationOutcome::Rejected(rejection);
        }
    };

    match codec.verify_at(token, now) {
        Ok(claims) => AuthorizationOutcome::Authorized(claims),
        Err(reason) => {
            debug!(%reason, "credential failed verification");
            AuthorizationOutcome::Rejected(Rejection::ExpiredOrInvalidSignature)
        }
    }
}

/// Authorize a full request.
pub fn authorize_request<B>(req: &Request<B>, codec: &TokenCodec) -> AuthorizationOutcome {
    authorize(req.headers(), codec)
}
