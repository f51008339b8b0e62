//! HTTP request handlers.

use axum::extract::rejection::JsonRejection;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::auth::{AuthError, CurrentUser};
use crate::user::{SignupRequest, User, UserInfo};

use super::error::ApiResult;
use super::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by signup and login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

fn session_for(state: &AppState, user: &User) -> Result<LoginResponse, AuthError> {
    let token = state.auth.issue_token(&user.identity())?;
    Ok(LoginResponse {
        token: token.into_string(),
        user: UserInfo::from(user),
    })
}

/// Create an account and sign the new user in.
#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let user = state.users.register(request).await?;
    let response = session_for(&state, &user)?;

    info!(user_id = %user.id, "User signed up");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Exchange email and password for a credential.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(request) = payload?;
    let Some(user) = state
        .users
        .verify_credentials(&request.email, &request.password)
        .await?
    else {
        warn!(email = %request.email, "Login failed");
        return Err(AuthError::InvalidCredentials.into());
    };

    info!(user_id = %user.id, "User logged in");
    Ok(Json(session_for(&state, &user)?))
}

/// The identity the gate attached to this request.
pub async fn me(user: CurrentUser) -> Json<UserInfo> {
    Json(UserInfo::from(user.identity()))
}
