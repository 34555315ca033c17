/// JWT Claims structure
///
/// Payload shared by access and refresh tokens: subject identity, issue and
/// expiry times (RFC 7519), plus a token class and a unique token id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// Which of the two token classes a token belongs to
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Unique token id, keeps two tokens minted in the same second distinct
    pub jti: String,
    /// Token class
    pub typ: TokenKind,
}

impl Claims {
    /// Create new claims for a user
    ///
    /// # Arguments
    /// * `user_id` - User's UUID
    /// * `kind` - Access or refresh
    /// * `expiry_seconds` - Token lifetime in seconds from `now`
    /// * `issuer` - Issuer identifier
    /// * `now` - Issue time (Unix timestamp)
    pub fn new(
        user_id: Uuid,
        kind: TokenKind,
        expiry_seconds: i64,
        issuer: String,
        now: i64,
    ) -> Self {
        Self {
            sub: user_id.to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
            typ: kind,
        }
    }

    /// Extract user ID from claims
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)
    }

    /// A token is live while `exp > now`
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }
}
