//! User management module.
//!
//! Stores users and checks their passwords so signup and login can mint
//! credentials.

mod error;
mod models;
mod repository;
mod service;

pub use error::UserError;
pub use models::{NewUser, SignupRequest, User, UserInfo};
pub use repository::{IdentityStore, UserRepository};
pub use service::UserService;
