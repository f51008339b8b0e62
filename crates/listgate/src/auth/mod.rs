//! Authentication module.
//!
//! Issues signed, time-bounded credentials and gates routes on them:
//! - `codec`: HS256 JWT issue/verify with a secret fixed at startup
//! - `gate`: pure `Authorization: Bearer` decision
//! - `middleware`: axum layer attaching the caller to the request

mod claims;
mod codec;
mod config;
mod error;
mod gate;
mod middleware;

pub use claims::{ClaimSet, Identity};
pub use codec::{Credential, TokenCodec, VerifyError, now_unix};
pub use config::{AuthConfig, ConfigValidationError, DEFAULT_TOKEN_TTL_SECS, MIN_SECRET_LEN};
pub use error::AuthError;
pub use gate::{
    AuthorizationOutcome, Rejection, authorize, authorize_at, authorize_request, extract_bearer,
};
pub use middleware::{AuthState, CurrentUser, auth_middleware};
