//! User storage consumed by the auth service.
//!
//! The service only talks to [`UserRepository`]; [`PgUserRepository`] is the
//! PostgreSQL implementation used by the server. Email uniqueness and
//! `(provider, subject)` uniqueness are enforced by the store.

use std::{future::Future, pin::Pin};
use thiserror::Error;
use uuid::Uuid;

use super::user::User;

#[cfg(test)]
pub(crate) mod memory;
mod postgres;

pub use postgres::PgUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RepositoryFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

pub trait UserRepository: Send + Sync {
    fn find_by_email<'a>(&'a self, email: &'a str) -> RepositoryFuture<'a, Option<User>>;

    fn find_by_provider_identity<'a>(
        &'a self,
        provider: &'a str,
        subject: &'a str,
    ) -> RepositoryFuture<'a, Option<User>>;

    fn find_by_id(&self, id: Uuid) -> RepositoryFuture<'_, Option<User>>;

    /// Create a password account. Fails with [`RepositoryError::UniqueViolation`]
    /// when the email is taken.
    fn create_local<'a>(
        &'a self,
        email: &'a str,
        password_hash: &'a str,
    ) -> RepositoryFuture<'a, User>;

    /// Create an account linked to an OAuth identity, without a password.
    fn create_oauth<'a>(
        &'a self,
        email: &'a str,
        provider: &'a str,
        subject: &'a str,
    ) -> RepositoryFuture<'a, User>;
}
