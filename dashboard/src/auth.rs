//! Salted password hashing.
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Hash `password` with Argon2id and a random salt into a PHC string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Check `password` against a PHC string produced by `hash_password`.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    let parsed =
        PasswordHash::new(password_hash).map_err(|e| AuthError::MalformedHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_hash_is_salted_and_verifies() -> Result<(), AuthError> {
        let first = hash_password("hunter2")?;
        let second = hash_password("hunter2")?;

        assert_ne!(first, second);
        assert!(!first.contains("hunter2"));
        assert!(first.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &first)?);
        assert!(!verify_password("hunter3", &first)?);

        Ok(())
    }

    #[test]
    fn test_malformed_hash() {
        assert!(matches!(
            verify_password("hunter2", "plaintext"),
            Err(AuthError::MalformedHash(_))
        ));
    }
}
