/// Password Hashing and Verification
///
/// Salted one-way hashing with bcrypt. Plaintext passwords never leave this
/// module and are never logged.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::{AppError, ValidationError};

// bcrypt only reads this many bytes of input
const MAX_PASSWORD_LENGTH: usize = 72;

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher {
    /// # Arguments
    /// * `cost` - bcrypt work factor (4..=31)
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password using bcrypt
    ///
    /// Output is a fixed-length, self-describing `$2b$` string with an
    /// embedded random salt, safe to persist.
    ///
    /// # Errors
    /// - Empty password
    /// - Password longer than 72 bytes
    /// - Bcrypt failure (invalid cost)
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        if password.is_empty() {
            return Err(AppError::Validation(ValidationError::EmptyField(
                "password".to_string(),
            )));
        }

        if password.len() > MAX_PASSWORD_LENGTH {
            return Err(AppError::Validation(ValidationError::TooLong(
                "password".to_string(),
                MAX_PASSWORD_LENGTH,
            )));
        }

        hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against its hash
    ///
    /// A mismatch is `Ok(false)`. An error only means the stored hash itself
    /// is unreadable. Over-long input never matches, since nothing that long
    /// could have been hashed.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        if password.len() > MAX_PASSWORD_LENGTH {
            return Ok(false);
        }

        verify(password, hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
    }
}
