//! Test utilities and common setup.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use listgate::api;
use listgate::auth::{AuthConfig, AuthState};
use listgate::db::Database;
use listgate::user::{UserRepository, UserService};

pub const TEST_SECRET: &str = "test-secret-for-integration-tests-minimum-32-chars";

fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: Some(TEST_SECRET.to_string()),
        ..AuthConfig::default()
    }
}

/// Create a test application backed by an in-memory database.
pub async fn test_app() -> Router {
    let db = Database::in_memory().await.unwrap();
    let auth_state = AuthState::new(test_auth_config()).unwrap();

    let user_service = UserService::new(UserRepository::new(db.pool().clone()));

    let state = api::AppState::new(user_service, auth_state);
    api::create_router(state)
}

/// Send one request and return the status with the parsed JSON body
/// (`Value::Null` when the body is not JSON).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
