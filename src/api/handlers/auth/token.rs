//! Signed bearer tokens for sessions, password resets, and email verification.
//!
//! Tokens are HS256 JWTs. Each carries a `purpose` claim so a reset token can
//! never be presented as a session, and a `jti` so its digest can be stored
//! and revoked server-side.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a token is allowed to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Session,
    Reset,
    Verify,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    /// What this token may be used for.
    pub purpose: TokenPurpose,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiry (Unix timestamp).
    pub exp: i64,
    /// Token id, unique per issuance.
    pub jti: String,
}

impl Claims {
    #[must_use]
    pub fn new(account_id: Uuid, purpose: TokenPurpose, ttl_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: account_id.to_string(),
            purpose,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_seconds)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Parse the subject back into an account id.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if the subject is not a UUID.
    pub fn account_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Invalid)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to encode token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
    #[error("token purpose mismatch")]
    PurposeMismatch,
}

/// Sign a token for the given account and purpose.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn issue(
    account_id: Uuid,
    purpose: TokenPurpose,
    ttl_seconds: i64,
    secret: &SecretString,
) -> Result<String, TokenError> {
    let claims = Claims::new(account_id, purpose, ttl_seconds);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(TokenError::from)
}

/// Verify signature, expiry, and purpose, returning the claims.
///
/// # Errors
///
/// Returns `Expired` for expired tokens, `PurposeMismatch` when a valid token
/// is presented for the wrong purpose, and `Invalid` otherwise.
pub fn verify(
    token: &str,
    expected: TokenPurpose,
    secret: &SecretString,
) -> Result<Claims, TokenError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })?;

    if data.claims.purpose != expected {
        return Err(TokenError::PurposeMismatch);
    }

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_secret() -> SecretString {
        SecretString::from("test-secret-key-for-jwt-testing-minimum-32-chars")
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let account_id = Uuid::new_v4();
        let token = issue(account_id, TokenPurpose::Session, 3600, &test_secret()).unwrap();
        assert!(!token.is_empty());

        let claims = verify(&token, TokenPurpose::Session, &test_secret()).unwrap();
        assert_eq!(claims.account_id().unwrap(), account_id);
        assert!(claims.exp > claims.iat);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn verify_rejects_wrong_purpose() {
        let token = issue(Uuid::new_v4(), TokenPurpose::Reset, 3600, &test_secret()).unwrap();
        let result = verify(&token, TokenPurpose::Session, &test_secret());
        assert!(matches!(result, Err(TokenError::PurposeMismatch)));
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let token = issue(Uuid::new_v4(), TokenPurpose::Session, 3600, &test_secret()).unwrap();
        let other = SecretString::from("wrong-secret-key-for-testing-minimum-32-chars");
        assert!(matches!(
            verify(&token, TokenPurpose::Session, &other),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn verify_rejects_expired() {
        // jsonwebtoken applies default leeway, so go well past it.
        let token = issue(Uuid::new_v4(), TokenPurpose::Session, -3600, &test_secret()).unwrap();
        assert!(matches!(
            verify(&token, TokenPurpose::Session, &test_secret()),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn verify_rejects_garbage() {
        assert!(matches!(
            verify("not.a.token", TokenPurpose::Session, &test_secret()),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn each_issue_gets_a_fresh_jti() {
        let account_id = Uuid::new_v4();
        let first = issue(account_id, TokenPurpose::Session, 3600, &test_secret()).unwrap();
        let second = issue(account_id, TokenPurpose::Session, 3600, &test_secret()).unwrap();
        assert_ne!(first, second);
    }
}
