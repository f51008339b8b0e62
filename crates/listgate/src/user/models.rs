//! User data models.

use serde::{Deserialize, Serialize};

use crate::auth::Identity;

/// A stored user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub created_at: String,
}

impl User {
    /// The identity a credential for this user carries.
    pub fn identity(&self) -> Identity {
        Identity::new(&self.id, &self.email, &self.display_name)
    }
}

/// A user ready to be inserted; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
}

/// Signup payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

impl From<Identity> for UserInfo {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.identity_id,
            email: identity.email,
            display_name: identity.display_name,
        }
    }
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
        }
    }
}
