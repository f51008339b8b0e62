//! listgate: signed credentials and a request authorization gate for the
//! listings backend.

pub mod api;
pub mod auth;
pub mod db;
pub mod user;
