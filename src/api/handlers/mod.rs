//! HTTP handlers.
//!
//! Handlers translate between HTTP and [`crate::auth::AuthService`]; every
//! decision about credentials and sessions is made by the service.

pub mod auth;
pub mod health;
