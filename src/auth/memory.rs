use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{
    repo::{RepoError, UserRepository},
    repo_types::{NewUser, User},
};

/// Process-local user store keyed by normalized email.
///
/// Every operation runs under one lock, so check-then-insert in `create` and
/// the conditional verification-token writes are atomic.
#[derive(Default)]
pub struct MemoryUserRepository {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, User>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        let mut users = self.lock();
        if users.contains_key(&user.email) {
            return Err(RepoError::Conflict);
        }
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            is_email_verified: false,
            email_verification_token: None,
            email_verification_sent_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(created.email.clone(), created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, RepoError> {
        self.lock().get(email).cloned().ok_or(RepoError::NotFound)
    }

    async fn issue_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
        sent_at: OffsetDateTime,
    ) -> Result<bool, RepoError> {
        let mut users = self.lock();
        let Some(stored) = users
            .values_mut()
            .find(|u| u.id == user_id && !u.is_email_verified)
        else {
            return Ok(false);
        };
        stored.email_verification_token = Some(token.to_string());
        stored.email_verification_sent_at = Some(sent_at);
        Ok(true)
    }

    async fn revoke_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<bool, RepoError> {
        let mut users = self.lock();
        let Some(stored) = users.values_mut().find(|u| {
            u.id == user_id && u.email_verification_token.as_deref() == Some(token)
        }) else {
            return Ok(false);
        };
        stored.email_verification_token = None;
        stored.email_verification_sent_at = None;
        Ok(true)
    }

    async fn consume_verification_token(
        &self,
        token: &str,
        issued_after: OffsetDateTime,
    ) -> Result<User, RepoError> {
        let mut users = self.lock();
        let stored = users
            .values_mut()
            .find(|u| {
                u.email_verification_token.as_deref() == Some(token)
                    && u.email_verification_sent_at.is_some_and(|at| at > issued_after)
            })
            .ok_or(RepoError::NotFound)?;
        stored.is_email_verified = true;
        stored.email_verification_token = None;
        stored.email_verification_sent_at = None;
        Ok(stored.clone())
    }
}
