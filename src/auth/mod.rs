/// Authentication module
///
/// Password hashing, JWT issuance/verification for access and refresh
/// tokens, and refresh token fingerprints for server-side storage.

mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use claims::{Claims, TokenKind};
pub use jwt::{TokenPair, TokenService};
pub use password::PasswordHasher;
pub use refresh_token::{fingerprint, matches_fingerprint};
