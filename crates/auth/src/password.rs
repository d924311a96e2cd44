//! Password verification.
//!
//! New hashes are argon2 PHC strings. Rows written before the move to argon2
//! hold bcrypt hashes (`$2a$`, `$2b$`, `$2y$`) and still verify.

use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{PasswordHash, SaltString, rand_core::OsRng},
};
use thiserror::Error;

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("stored password hash is not a recognized format")]
    MalformedHash,

    #[error("password does not match")]
    Mismatch,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Check `password` against a stored argon2 or bcrypt hash.
pub fn verify_password(password: &str, stored: &str) -> Result<(), PasswordError> {
    if is_bcrypt(stored) {
        return match bcrypt::verify(password, stored) {
            Ok(true) => Ok(()),
            Ok(false) => Err(PasswordError::Mismatch),
            Err(_) => Err(PasswordError::MalformedHash),
        };
    }

    let parsed = PasswordHash::new(stored).map_err(|_| PasswordError::MalformedHash)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PasswordError::Mismatch)
}

fn is_bcrypt(stored: &str) -> bool {
    BCRYPT_PREFIXES.iter().any(|prefix| stored.starts_with(prefix))
}

/// Produce a PHC string for seeding users (tests, dev fixtures).
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let phc = hash_password("correct horse").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert_eq!(verify_password("correct horse", &phc), Ok(()));
        assert_eq!(verify_password("wrong", &phc), Err(PasswordError::Mismatch));
    }

    #[test]
    fn garbage_hash_is_malformed() {
        assert_eq!(verify_password("x", "plaintext"), Err(PasswordError::MalformedHash));
        assert_eq!(verify_password("x", "$2b$10$tooshort"), Err(PasswordError::MalformedHash));
    }

    #[test]
    fn legacy_bcrypt_hashes_verify() {
        let stored = bcrypt::hash("hunter22", 4).unwrap();
        assert!(stored.starts_with("$2b$"));
        assert_eq!(verify_password("hunter22", &stored), Ok(()));
        assert_eq!(verify_password("hunter23", &stored), Err(PasswordError::Mismatch));

        let go_style = stored.replacen("$2b$", "$2a$", 1);
        assert_eq!(verify_password("hunter22", &go_style), Ok(()));
    }

    #[test]
    fn existing_bcrypt_rows_are_recognized() {
        let stored = "$2a$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";
        assert_ne!(verify_password("password", stored), Err(PasswordError::MalformedHash));
        assert_eq!(verify_password("not-the-password", stored), Err(PasswordError::Mismatch));
    }
}
