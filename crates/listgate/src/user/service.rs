//! User service for business logic.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use super::error::UserError;
use super::models::{NewUser, SignupRequest, User};
use super::repository::IdentityStore;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_DISPLAY_NAME_LEN: usize = 100;

/// Signup and login over an [`IdentityStore`].
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn IdentityStore>,
}

impl UserService {
    pub fn new(store: impl IdentityStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Register a new user with validation.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: SignupRequest) -> Result<User, UserError> {
        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(UserError::InvalidInput("Invalid email format.".to_string()));
        }

        let display_name = request.display_name.trim();
        if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(UserError::InvalidInput(format!(
                "Display name must be between 1 and {} characters.",
                MAX_DISPLAY_NAME_LEN
            )));
        }

        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(UserError::InvalidInput(format!(
                "Password must be at least {} characters.",
                MIN_PASSWORD_LEN
            )));
        }

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(UserError::AlreadyRegistered(email));
        }

        let user = self
            .store
            .insert(NewUser {
                email,
                display_name: display_name.to_string(),
                password_hash: hash_password(&request.password)?,
            })
            .await?;
        info!(user_id = %user.id, "Registered new user");

        Ok(user)
    }

    /// Verify login credentials. `None` covers both an unknown email and a
    /// wrong password.
    #[instrument(skip(self, password))]
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_by_email(&email).await? else {
            return Ok(None);
        };

        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Basic email validation.
fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    !parts[0].is_empty() && parts[1].contains('.') && !email.contains(char::is_whitespace)
}

/// Hash a password using bcrypt.
fn hash_password(password: &str) -> Result<String> {
    let cost = if cfg!(debug_assertions) { 4 } else { 10 };
    bcrypt::hash(password, cost).context("Failed to hash password")
}

/// Verify a password against a bcrypt hash. A corrupt hash counts as a
/// mismatch.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    match bcrypt::verify(password, hash) {
        Ok(matches) => Ok(matches),
        Err(bcrypt::BcryptError::InvalidHash(_)) => Ok(false),
        Err(err) => Err(err).context("Failed to verify password"),
    }
}
