//! In-memory repository for tests.

use chrono::Utc;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard,
};
use uuid::Uuid;

use super::{RepositoryError, RepositoryFuture, UserRepository};
use crate::auth::user::User;

#[derive(Debug, Default)]
pub(crate) struct MemoryUserRepository {
    users: Mutex<Vec<User>>,
    fail_creates: AtomicBool,
}

impl MemoryUserRepository {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every create call fail with a non-conflict error.
    pub(crate) fn fail_creates(&self) {
        self.fail_creates.store(true, Ordering::SeqCst);
    }

    pub(crate) fn remove(&self, id: Uuid) {
        self.lock().retain(|user| user.id != id);
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<User>> {
        self.users
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn insert(&self, user: User) -> Result<User, RepositoryError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Other(anyhow::anyhow!("insert failed")));
        }
        let mut users = self.lock();
        let conflict = users.iter().any(|existing| {
            existing.email == user.email
                || (user.oauth_provider.is_some()
                    && existing.oauth_provider == user.oauth_provider
                    && existing.oauth_id == user.oauth_id)
        });
        if conflict {
            return Err(RepositoryError::UniqueViolation);
        }
        users.push(user.clone());
        Ok(user)
    }

    fn find(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.lock().iter().find(|user| predicate(user)).cloned()
    }
}

impl UserRepository for MemoryUserRepository {
    fn find_by_email<'a>(&'a self, email: &'a str) -> RepositoryFuture<'a, Option<User>> {
        Box::pin(async move { Ok(self.find(|user| user.email == email)) })
    }

    fn find_by_provider_identity<'a>(
        &'a self,
        provider: &'a str,
        subject: &'a str,
    ) -> RepositoryFuture<'a, Option<User>> {
        Box::pin(async move {
            Ok(self.find(|user| {
                user.oauth_provider.as_deref() == Some(provider)
                    && user.oauth_id.as_deref() == Some(subject)
            }))
        })
    }

    fn find_by_id(&self, id: Uuid) -> RepositoryFuture<'_, Option<User>> {
        Box::pin(async move { Ok(self.find(|user| user.id == id)) })
    }

    fn create_local<'a>(
        &'a self,
        email: &'a str,
        password_hash: &'a str,
    ) -> RepositoryFuture<'a, User> {
        Box::pin(async move {
            self.insert(User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                password_hash: Some(password_hash.to_string()),
                oauth_provider: None,
                oauth_id: None,
                created_at: Utc::now(),
            })
        })
    }

    fn create_oauth<'a>(
        &'a self,
        email: &'a str,
        provider: &'a str,
        subject: &'a str,
    ) -> RepositoryFuture<'a, User> {
        Box::pin(async move {
            self.insert(User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                password_hash: None,
                oauth_provider: Some(provider.to_string()),
                oauth_id: Some(subject.to_string()),
                created_at: Utc::now(),
            })
        })
    }
}
