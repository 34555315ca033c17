use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::CredentialStore;
use crate::error::{AppError, DatabaseError};
use crate::models::{NewUser, UserCredential};

const USER_COLUMNS: &str = "id, username, email, fullname, avatar, cover_image, password_hash, \
                            refresh_token_hash, created_at, updated_at";

/// Postgres-backed credential store
///
/// Unique indexes on `username` and `email` back the duplicate check; the
/// conditional `UPDATE` in `replace_refresh_token` is the single
/// serialization point for rotation.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert(&self, user: NewUser) -> Result<UserCredential, AppError> {
        let credential = user.into_credential();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, fullname, avatar, cover_image,
                               password_hash, refresh_token_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8, $9)
            "#,
        )
        .bind(credential.id)
        .bind(&credential.username)
        .bind(&credential.email)
        .bind(&credential.fullname)
        .bind(&credential.avatar)
        .bind(&credential.cover_image)
        .bind(&credential.password_hash)
        .bind(credential.created_at)
        .bind(credential.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserCredential>, AppError> {
        let user = sqlx::query_as::<_, UserCredential>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserCredential>, AppError> {
        // NULL never compares equal, so an absent half of the OR matches nothing
        let user = sqlx::query_as::<_, UserCredential>(&format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $2 LIMIT 1",
            USER_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, digest: Option<&str>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(digest)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        digest: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $1, updated_at = $2
            WHERE id = $3 AND refresh_token_hash = $4
            "#,
        )
        .bind(digest)
        .bind(Utc::now())
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Database(DatabaseError::NotFound("user".to_string())));
        }
        Ok(())
    }
}
