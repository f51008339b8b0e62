//! HTTP API module.
//!
//! Signup, login and the current identity, with `/auth/me` behind the
//! authorization gate.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use handlers::{HealthResponse, LoginRequest, LoginResponse};
pub use routes::create_router;
pub use state::AppState;
