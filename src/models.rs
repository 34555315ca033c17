/// Account records
///
/// `UserCredential` is the persisted record and carries the secrets; it is
/// deliberately not `Serialize`. `UserProfile` is the public projection that
/// handlers return and that the authenticator attaches to requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, sqlx::FromRow)]
pub struct UserCredential {
    pub id: Uuid,
    /// Stored lower-cased
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    /// Empty when no cover image was uploaded
    pub cover_image: String,
    pub password_hash: String,
    /// SHA-256 fingerprint of the one live refresh token, if any
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for UserCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredential")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field(
                "refresh_token_hash",
                &self.refresh_token_hash.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Fields supplied at registration, password already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn into_credential(self) -> UserCredential {
        let now = Utc::now();
        UserCredential {
            id: Uuid::new_v4(),
            username: self.username,
            email: self.email,
            fullname: self.fullname,
            avatar: self.avatar,
            cover_image: self.cover_image,
            password_hash: self.password_hash,
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Identity as exposed to clients and downstream handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&UserCredential> for UserProfile {
    fn from(user: &UserCredential) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            fullname: user.fullname.clone(),
            avatar: user.avatar.clone(),
            cover_image: user.cover_image.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
