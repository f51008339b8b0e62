//! User store errors.

use thiserror::Error;

/// Errors from registering or storing a user.
#[derive(Debug, Error)]
pub enum UserError {
    /// Signup payload failed validation; the message is safe to show.
    #[error("{0}")]
    InvalidInput(String),

    #[error("Email '{0}' is already registered.")]
    AlreadyRegistered(String),

    /// Storage or hashing failure; never shown to clients.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
