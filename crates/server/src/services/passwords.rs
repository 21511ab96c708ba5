//! Argon2id password hashing.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

/// Hashing failed inside argon2.
#[derive(Debug, Error)]
#[error("password hashing error")]
pub struct PasswordHashError;

/// Hash a password using Argon2id with a random salt. Returns a PHC string.
///
/// # Errors
///
/// Returns `PasswordHashError` if argon2 rejects the parameters.
pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordHashError)
}

/// Verify a password against a stored PHC string. Unparseable hashes never match.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("TestPass123!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("TestPass123!", &hash));
        assert!(!verify_password("TestPass124!", &hash));
    }

    #[test]
    fn salts_differ() {
        let a = hash_password("TestPass123!").unwrap();
        let b = hash_password("TestPass123!").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_never_matches() {
        assert!(!verify_password("anything1", "not-a-phc-string"));
        assert!(!verify_password("anything1", ""));
    }
}
