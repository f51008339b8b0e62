//! axum middleware and extractor for authenticated routes.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use super::claims::{ClaimSet, Identity};
use super::codec::{Credential, TokenCodec};
use super::config::{AuthConfig, ConfigValidationError};
use super::error::AuthError;
use super::gate::{self, AuthorizationOutcome};

/// Shared authentication state.
///
/// Built once at startup; the codec inside is read-only afterwards.
#[derive(Debug, Clone)]
pub struct AuthState {
    codec: Arc<TokenCodec>,
    allowed_origins: Arc<Vec<String>>,
}

impl AuthState {
    /// Create auth state from configuration. Fails when no usable secret
    /// is configured.
    pub fn new(config: AuthConfig) -> Result<Self, ConfigValidationError> {
        let codec = TokenCodec::from_config(&config)?;
        Ok(Self {
            codec: Arc::new(codec),
            allowed_origins: Arc::new(config.allowed_origins),
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    /// Issue a credential for a freshly authenticated identity.
    pub fn issue_token(&self, identity: &Identity) -> Result<Credential, AuthError> {
        self.codec.issue(identity)
    }

    /// Run the authorization gate over request headers.
    pub fn authorize(&self, headers: &HeaderMap) -> AuthorizationOutcome {
        gate::authorize(headers, &self.codec)
    }
}

/// The verified caller, attached to request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub claims: ClaimSet,
}

impl CurrentUser {
    pub fn id(&self) -> &str {
        self.claims.identity_id()
    }

    pub fn email(&self) -> &str {
        self.claims.email()
    }

    pub fn display_name(&self) -> &str {
        self.claims.display_name()
    }

    pub fn identity(&self) -> Identity {
        self.claims.identity()
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingCredential)
    }
}

/// Gate a route: attach [`CurrentUser`] or short-circuit with 401/403.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = auth.authorize(req.headers()).into_result()?;

    debug!(
        user_id = %claims.identity_id(),
        path = %req.uri().path(),
        "request authorized"
    );
    req.extensions_mut().insert(CurrentUser { claims });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{StatusCode, header};
    use axum::routing::get;
    use axum::{Router, middleware};
    use tower::ServiceExt;

    const SECRET: &str = "test-secret-for-middleware-tests-minimum-32-chars";

    fn auth_state() -> AuthState {
        AuthState::new(AuthConfig {
            jwt_secret: Some(SECRET.to_string()),
            ..AuthConfig::default()
        })
        .unwrap()
    }

    async fn whoami(user: CurrentUser) -> String {
        format!("{}|{}|{}", user.id(), user.email(), user.display_name())
    }

    fn app(auth: AuthState) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(auth, auth_middleware))
    }

    async fn status_for(auth: AuthState, authorization: Option<String>) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let response = app(auth)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[test]
    fn test_auth_state_fails_closed() {
        assert_eq!(
            AuthState::new(AuthConfig::default()).unwrap_err(),
            ConfigValidationError::MissingJwtSecret
        );
    }

    #[tokio::test]
    async fn test_authorized_request_sees_identity() {
        let auth = auth_state();
        let token = auth
            .issue_token(&Identity::new("u1", "a@b.com", "A"))
            .unwrap();

        let (status, body) = status_for(auth, Some(format!("Bearer {}", token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "u1|a@b.com|A");
    }

    #[tokio::test]
    async fn test_missing_header_is_401() {
        let (status, _) = status_for(auth_state(), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_header_is_403() {
        let (status, _) = status_for(auth_state(), Some("Bearer".to_string())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bad_token_is_403_without_detail() {
        let (status, body) =
            status_for(auth_state(), Some("Bearer abc.def.ghi".to_string())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(!body.contains("signature"));
        assert!(!body.contains("parsed"));
    }

    #[tokio::test]
    async fn test_extractor_without_middleware_is_401() {
        let app = Router::new().route("/whoami", get(whoami));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/whoami")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
