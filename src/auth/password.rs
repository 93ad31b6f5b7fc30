//! Password hashing and verification (Argon2id).
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=19456,t=2,p=1$<salt>$<digest>`), so the
//! algorithm, cost parameters and salt travel with the digest and verification needs
//! no other state. Verification goes through `password-hash`, which compares digests
//! in constant time.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hashing(String),
    #[error("malformed password hash: {0}")]
    MalformedHash(String),
}

/// Hash a password with Argon2id and a fresh random salt.
///
/// # Errors
/// Returns [`PasswordError::Hashing`] if the hasher rejects the input or parameters.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordError::Hashing(err.to_string()))
}

/// Verify a password against a PHC-format hash.
///
/// Returns `Ok(false)` on mismatch.
///
/// # Errors
/// Returns [`PasswordError::MalformedHash`] if `hash` is not a valid PHC string.
pub fn verify_password(hash: &str, password: &str) -> Result<bool, PasswordError> {
    let parsed =
        PasswordHash::new(hash).map_err(|err| PasswordError::MalformedHash(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

// Verified when a login has no hash to check against, so unknown accounts cost the
// same as a wrong password.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("authgate-dummy-password").ok());

/// Burn one verification worth of CPU without a real account behind it.
pub(crate) fn verify_dummy(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(hash, password);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn hash_then_verify_accepts_same_password() -> Result<()> {
        let hash = hash_password("password1")?;
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&hash, "password1")?);
        Ok(())
    }

    #[test]
    fn verify_rejects_different_password() -> Result<()> {
        let hash = hash_password("password1")?;
        assert!(!verify_password(&hash, "password2")?);
        assert!(!verify_password(&hash, "")?);
        Ok(())
    }

    #[test]
    fn hashes_are_salted() -> Result<()> {
        let first = hash_password("same-password")?;
        let second = hash_password("same-password")?;
        assert_ne!(first, second);
        assert!(verify_password(&first, "same-password")?);
        assert!(verify_password(&second, "same-password")?);
        Ok(())
    }

    #[test]
    fn verify_reports_malformed_hash() {
        let result = verify_password("not-a-phc-string", "password1");
        assert!(matches!(result, Err(PasswordError::MalformedHash(_))));
    }

    #[test]
    fn verify_dummy_does_not_panic() {
        verify_dummy("anything");
    }
}
