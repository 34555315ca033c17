/// JWT Token Generation and Validation
///
/// Issues and verifies the two token classes. Access and refresh tokens are
/// signed with independent HS256 secrets and carry independent lifetimes.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Freshly issued access + refresh token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct TokenService {
    settings: JwtSettings,
}

impl TokenService {
    pub fn new(settings: JwtSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &JwtSettings {
        &self.settings
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.settings.access_token_secret.as_bytes(),
            TokenKind::Refresh => self.settings.refresh_token_secret.as_bytes(),
        }
    }

    fn expiry(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.settings.access_token_expiry,
            TokenKind::Refresh => self.settings.refresh_token_expiry,
        }
    }

    /// Sign a token of the given class, issued at `now`
    ///
    /// # Errors
    /// Returns error if signing fails
    pub fn issue_at(&self, user_id: &Uuid, kind: TokenKind, now: i64) -> Result<String, AppError> {
        let claims = Claims::new(
            *user_id,
            kind,
            self.expiry(kind),
            self.settings.issuer.clone(),
            now,
        );

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret(kind)),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    pub fn issue_access_token(&self, user_id: &Uuid) -> Result<String, AppError> {
        self.issue_at(user_id, TokenKind::Access, chrono::Utc::now().timestamp())
    }

    pub fn issue_refresh_token(&self, user_id: &Uuid) -> Result<String, AppError> {
        self.issue_at(user_id, TokenKind::Refresh, chrono::Utc::now().timestamp())
    }

    /// Issue a matching access/refresh pair for a user
    pub fn issue_pair(&self, user_id: &Uuid) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user_id)?,
            refresh_token: self.issue_refresh_token(user_id)?,
            expires_in: self.settings.access_token_expiry,
        })
    }

    /// Verify a token against the clock at `now`
    ///
    /// # Errors
    /// - `TokenInvalid`: malformed, bad signature, wrong issuer or wrong class
    /// - `TokenExpired`: authentic but `exp <= now`
    pub fn verify_at(&self, token: &str, kind: TokenKind, now: i64) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.settings.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        // Expiry is checked below against the supplied clock, without leeway
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &DecodingKey::from_secret(self.secret(kind)), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!(token_kind = %kind, "JWT validation error: {}", e);
                AuthError::TokenInvalid
            })?;

        if claims.typ != kind {
            tracing::warn!(expected = %kind, found = %claims.typ, "Token class mismatch");
            return Err(AuthError::TokenInvalid);
        }

        if claims.is_expired_at(now) {
            tracing::info!(token_kind = %kind, user_id = %claims.sub, "Token expired");
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        self.verify_at(token, kind, chrono::Utc::now().timestamp())
    }
}
