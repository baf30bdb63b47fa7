//! Password hashing and verification
//!
//! New hashes are Argon2 PHC strings. Hashes written by the previous system
//! are bcrypt (`$2a$`, `$2b$`, `$2y$`) and are still accepted on login.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use thiserror::Error;

/// Errors raised while hashing or parsing a stored hash
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Argon2 error: {0}")]
    Argon2(String),

    #[error("Bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("Unsupported password hash format")]
    UnsupportedFormat,
}

const BCRYPT_PREFIXES: [&str; 4] = ["$2a$", "$2b$", "$2x$", "$2y$"];

/// Hash a password with Argon2 and a random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Argon2(e.to_string()))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a stored hash.
///
/// `Ok(false)` means the password does not match; `Err` means the stored
/// hash could not be used at all.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
    if BCRYPT_PREFIXES
        .iter()
        .any(|prefix| stored_hash.starts_with(prefix))
    {
        return Ok(bcrypt::verify(password, stored_hash)?);
    }

    if stored_hash.starts_with("$argon2") {
        let parsed_hash =
            PasswordHash::new(stored_hash).map_err(|e| PasswordError::Argon2(e.to_string()))?;
        return Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok());
    }

    Err(PasswordError::UnsupportedFormat)
}

/// Verify a password on the blocking pool; adaptive hashes are CPU-bound
pub async fn verify_password_blocking(
    password: String,
    stored_hash: String,
) -> Result<Result<bool, PasswordError>, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argon2_round_trip() {
        let hash = hash_password("Admin33#").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Admin33#", &hash).unwrap());
        assert!(!verify_password("admin33#", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let first = hash_password("Admin33#").unwrap();
        let second = hash_password("Admin33#").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_bcrypt_hashes_are_accepted() {
        let hash = bcrypt::hash("Admin33#", 4).unwrap();
        assert!(verify_password("Admin33#", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_plaintext_or_unknown_hash_is_an_error() {
        assert!(matches!(
            verify_password("Admin33#", "Admin33#"),
            Err(PasswordError::UnsupportedFormat)
        ));
        // salt and digest too short to be a PHC string
        assert!(verify_password("x", "$argon2id$v=19$m=notanumber$x$y").is_err());
    }

    #[tokio::test]
    async fn test_blocking_verification() {
        let hash = hash_password("secret-pass").unwrap();
        let result = verify_password_blocking("secret-pass".to_string(), hash)
            .await
            .unwrap();
        assert!(result.unwrap());
    }
}
