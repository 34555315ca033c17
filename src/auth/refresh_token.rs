/// Refresh Token Fingerprints
///
/// The credential store never holds a refresh token in plaintext, only its
/// SHA-256 digest. Two tokens are the same token exactly when their
/// fingerprints match, so the one-live-token comparison runs on digests.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of a refresh token
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whether a presented token is the one currently on record
pub fn matches_fingerprint(token: &str, stored: Option<&str>) -> bool {
    stored.map_or(false, |digest| fingerprint(token) == digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        let token = "header.payload.signature";
        let hash1 = fingerprint(token);
        let hash2 = fingerprint(token);

        assert_eq!(hash1, hash2);
        assert_ne!(token, hash1);
        // SHA-256 hex
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_tokens_different_fingerprints() {
        assert_ne!(fingerprint("token-a"), fingerprint("token-b"));
    }

    #[test]
    fn test_matches_fingerprint() {
        let stored = fingerprint("token-a");

        assert!(matches_fingerprint("token-a", Some(&stored)));
        assert!(!matches_fingerprint("token-b", Some(&stored)));
        assert!(!matches_fingerprint("token-a", None));
    }
}
