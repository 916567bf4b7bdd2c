//! Argon2id password hashing and strength checks.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("failed to hash password")]
    HashingFailed,
    #[error("password verification failed")]
    VerificationFailed,
    #[error("invalid stored hash format")]
    InvalidHashFormat,
}

/// Hash a password into a PHC string with a fresh random salt.
///
/// # Errors
///
/// Returns `HashingFailed` if the hasher rejects the input.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordError::HashingFailed)
}

/// Verify a password against a stored PHC hash.
///
/// # Errors
///
/// Returns `VerificationFailed` on mismatch and `InvalidHashFormat` when the
/// stored value is not a PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PasswordError::VerificationFailed)
}

/// Verify the password against a fixed throwaway hash and discard the result.
///
/// Run on login when the email has no account, so a lookup miss costs the
/// same argon2 work as a password mismatch and response timing does not
/// reveal which one happened.
pub fn dummy_verify(password: &str) {
    static DUMMY_HASH: std::sync::OnceLock<Option<String>> = std::sync::OnceLock::new();
    let hash = DUMMY_HASH.get_or_init(|| hash_password("placeholder-credential-1").ok());
    if let Some(hash) = hash {
        let _ = verify_password(password, hash);
    }
}

/// Minimum requirements: 8+ characters, at least one letter and one digit.
///
/// # Errors
///
/// Returns a user-facing message naming the unmet requirement.
pub fn validate_password_strength(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters long");
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number");
    }

    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err("Password must contain at least one letter");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let password = "TestPassword123";
        let hash = hash_password(password).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert_ne!(hash, password);

        assert!(verify_password(password, &hash).is_ok());
        assert!(verify_password("WrongPassword123", &hash).is_err());
    }

    #[test]
    fn same_password_different_salts() {
        let first = hash_password("Password1").unwrap();
        let second = hash_password("Password1").unwrap();
        assert_ne!(first, second);

        assert!(verify_password("Password1", &first).is_ok());
        assert!(verify_password("Password1", &second).is_ok());
    }

    #[test]
    fn invalid_hash_format() {
        let result = verify_password("password", "not-a-valid-hash");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn dummy_verify_never_panics() {
        dummy_verify("anything");
        dummy_verify("");
        // Second call reuses the cached hash.
        dummy_verify("anything-else");
    }

    #[test]
    fn strength_requirements() {
        assert!(validate_password_strength("Password1").is_ok());
        assert!(validate_password_strength("abcd1234").is_ok());

        assert!(validate_password_strength("Pass1").is_err());
        assert!(validate_password_strength("Password").is_err());
        assert!(validate_password_strength("12345678").is_err());
        assert!(validate_password_strength("").is_err());
    }
}
