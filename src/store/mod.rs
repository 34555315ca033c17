/// Credential Store
///
/// Persistence seam for user records. Handlers and the session layer only
/// see the trait; `PgCredentialStore` backs production and
/// `InMemoryCredentialStore` backs tests and the `memory` storage mode.

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewUser, UserCredential};

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new user
    ///
    /// Fails with `UniqueConstraintViolation` when the username or email is
    /// already taken.
    async fn insert(&self, user: NewUser) -> Result<UserCredential, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserCredential>, AppError>;

    /// Find the user matching the username OR the email
    ///
    /// `username` must already be normalized.
    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserCredential>, AppError>;

    /// Unconditionally overwrite (or clear, with `None`) the live refresh
    /// token fingerprint
    async fn set_refresh_token(&self, id: Uuid, digest: Option<&str>) -> Result<(), AppError>;

    /// Replace the live refresh token fingerprint only if it still equals
    /// `expected`
    ///
    /// Returns `false` when another writer got there first (or the user is
    /// gone).
    async fn replace_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        digest: &str,
    ) -> Result<bool, AppError>;

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError>;
}
