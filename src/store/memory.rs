use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::CredentialStore;
use crate::error::{AppError, DatabaseError};
use crate::models::{NewUser, UserCredential};

/// Process-local credential store
///
/// Every operation runs under one mutex, so the compare-and-swap in
/// `replace_refresh_token` is atomic.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: Mutex<HashMap<Uuid, UserCredential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> Result<MutexGuard<'_, HashMap<Uuid, UserCredential>>, AppError> {
        self.users
            .lock()
            .map_err(|_| AppError::Internal("credential store lock poisoned".to_string()))
    }

    /// Drop a user so tests can hold tokens for an identity that no longer exists
    #[cfg(test)]
    pub fn remove(&self, id: Uuid) -> Result<Option<UserCredential>, AppError> {
        Ok(self.users()?.remove(&id))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert(&self, user: NewUser) -> Result<UserCredential, AppError> {
        let mut users = self.users()?;

        let taken = users
            .values()
            .any(|existing| existing.username == user.username || existing.email == user.email);
        if taken {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "User with username or email already exists".to_string(),
            )));
        }

        let credential = user.into_credential();
        users.insert(credential.id, credential.clone());
        Ok(credential)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserCredential>, AppError> {
        Ok(self.users()?.get(&id).cloned())
    }

    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserCredential>, AppError> {
        let users = self.users()?;
        Ok(users
            .values()
            .find(|user| {
                username.map_or(false, |u| user.username == u)
                    || email.map_or(false, |e| user.email == e)
            })
            .cloned())
    }

    async fn set_refresh_token(&self, id: Uuid, digest: Option<&str>) -> Result<(), AppError> {
        if let Some(user) = self.users()?.get_mut(&id) {
            user.refresh_token_hash = digest.map(str::to_string);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        digest: &str,
    ) -> Result<bool, AppError> {
        let mut users = self.users()?;
        match users.get_mut(&id) {
            Some(user) if user.refresh_token_hash.as_deref() == Some(expected) => {
                user.refresh_token_hash = Some(digest.to_string());
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let mut users = self.users()?;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| AppError::Database(DatabaseError::NotFound("user".to_string())))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }
}
