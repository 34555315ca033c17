/// Session Coordinator
///
/// Orchestrates the per-identity session lifecycle on top of the credential
/// store: login issues a token pair and records its refresh token as the
/// single live one, logout clears it, and rotation swaps it for a new pair
/// exactly once.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::{fingerprint, matches_fingerprint, PasswordHasher, TokenKind, TokenPair, TokenService};
use crate::error::{AppError, AuthError, DatabaseError, ValidationError};
use crate::models::{NewUser, UserProfile};
use crate::store::CredentialStore;
use crate::validators::normalize_username;

/// Validated registration input, media already uploaded
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub password: String,
    pub avatar: String,
    pub cover_image: String,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    tokens: TokenService,
    hasher: PasswordHasher,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: TokenService, hasher: PasswordHasher) -> Self {
        Self {
            store,
            tokens,
            hasher,
        }
    }

    /// bcrypt blocks for the whole work factor; keep it off the async worker
    async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.hasher;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool, AppError> {
        let hasher = self.hasher;
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &password_hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
    }

    /// Fails with 409 when the username or email already belongs to someone
    pub async fn ensure_available(&self, username: &str, email: &str) -> Result<(), AppError> {
        let username = normalize_username(username);
        if self
            .store
            .find_by_login(Some(&username), Some(email))
            .await?
            .is_some()
        {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "User with username or email already exists".to_string(),
            )));
        }
        Ok(())
    }

    /// Create an account; the new identity starts logged out
    pub async fn register(&self, account: NewAccount) -> Result<UserProfile, AppError> {
        let password_hash = self.hash_password(&account.password).await?;

        let user = self
            .store
            .insert(NewUser {
                username: normalize_username(&account.username),
                email: account.email,
                fullname: account.fullname,
                avatar: account.avatar,
                cover_image: account.cover_image,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(UserProfile::from(&user))
    }

    /// Verify a username-or-email / password pair and open a session
    ///
    /// Overwrites any earlier refresh token: only the latest login can rotate.
    pub async fn login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        password: &str,
    ) -> Result<(UserProfile, TokenPair), AppError> {
        let username = username.map(normalize_username).filter(|u| !u.is_empty());
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        if username.is_none() && email.is_none() {
            return Err(AppError::Validation(ValidationError::EmptyField(
                "username or email".to_string(),
            )));
        }

        let user = self
            .store
            .find_by_login(username.as_deref(), email)
            .await?
            .ok_or(AuthError::UnknownAccount)?;

        if !self.verify_password(password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let pair = self.tokens.issue_pair(&user.id)?;
        self.store
            .set_refresh_token(user.id, Some(&fingerprint(&pair.refresh_token)))
            .await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok((UserProfile::from(&user), pair))
    }

    /// Invalidate the live refresh token; calling it twice is harmless
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.store.set_refresh_token(user_id, None).await?;
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Exchange the live refresh token for a new pair
    ///
    /// Every failure is a 401 to the client; the cause is only logged.
    pub async fn rotate_refresh_token(&self, presented: &str) -> Result<TokenPair, AppError> {
        let claims = self
            .tokens
            .verify(presented, TokenKind::Refresh)
            .map_err(|e| {
                tracing::warn!(cause = %e, "Refresh token rejected");
                e
            })?;
        let user_id = claims.user_id()?;

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::IdentityGone)?;

        if !matches_fingerprint(presented, user.refresh_token_hash.as_deref()) {
            tracing::warn!(user_id = %user_id, "Refresh token is not the live one");
            return Err(AuthError::RefreshTokenReused.into());
        }

        let pair = self.tokens.issue_pair(&user_id)?;
        let swapped = self
            .store
            .replace_refresh_token(
                user_id,
                &fingerprint(presented),
                &fingerprint(&pair.refresh_token),
            )
            .await?;

        if !swapped {
            tracing::warn!(user_id = %user_id, "Concurrent refresh token rotation lost the race");
            return Err(AuthError::RefreshTokenReused.into());
        }

        tracing::info!(user_id = %user_id, "Refresh token rotated");
        Ok(pair)
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Database(DatabaseError::NotFound("user".to_string())))?;

        if !self.verify_password(old_password, &user.password_hash).await? {
            return Err(ValidationError::IncorrectPassword.into());
        }

        let password_hash = self.hash_password(new_password).await?;
        self.store.update_password_hash(user_id, &password_hash).await?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Resolve an access token to the identity it was issued for
    ///
    /// The returned profile carries no secret fields.
    pub async fn identify(&self, access_token: Option<&str>) -> Result<UserProfile, AppError> {
        let token = access_token.ok_or(AuthError::MissingToken)?;
        let claims = self.tokens.verify(token, TokenKind::Access)?;
        let user_id = claims.user_id()?;

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::IdentityGone)?;

        Ok(UserProfile::from(&user))
    }
}
