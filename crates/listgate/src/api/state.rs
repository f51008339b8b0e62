//! Application state shared across handlers.

use crate::auth::AuthState;
use crate::user::UserService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub auth: AuthState,
}

impl AppState {
    pub fn new(users: UserService, auth: AuthState) -> Self {
        Self { users, auth }
    }
}
