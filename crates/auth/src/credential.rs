//! Credential verification (bcrypt).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("secret must not be empty")]
    EmptySecret,

    #[error("failed to hash secret")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Check a presented secret against a stored bcrypt hash.
///
/// Binary outcome: a malformed stored hash verifies as `false`.
pub fn verify_secret(plaintext: &str, stored_hash: &str) -> bool {
    match bcrypt::verify(plaintext, stored_hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "stored secret hash could not be parsed");
            false
        }
    }
}

/// Hash a secret for storage (registration, password change).
pub fn hash_secret(plaintext: &str, cost: u32) -> Result<String, CredentialError> {
    if plaintext.is_empty() {
        return Err(CredentialError::EmptySecret);
    }
    Ok(bcrypt::hash(plaintext, cost)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn verifies_matching_secret_only() {
        let hash = hash_secret("correct horse", TEST_COST).unwrap();
        assert!(verify_secret("correct horse", &hash));
        assert!(!verify_secret("correct horse ", &hash));
        assert!(!verify_secret("", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_secret("same", TEST_COST).unwrap();
        let b = hash_secret("same", TEST_COST).unwrap();
        assert_ne!(a, b);
        assert!(verify_secret("same", &a));
        assert!(verify_secret("same", &b));
    }

    #[test]
    fn malformed_hash_is_a_plain_rejection() {
        assert!(!verify_secret("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(
            hash_secret("", TEST_COST),
            Err(CredentialError::EmptySecret)
        ));
    }
}
