/**
 * Password Engine
 *
 * Slow, salted password hashing plus strength validation. Hashing uses
 * bcrypt with the default cost; validation collects every unmet rule so the
 * caller can surface all of them at once instead of one per round trip.
 */
use bcrypt::{hash, verify, DEFAULT_COST};

use crate::backend::error::ApiError;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password with bcrypt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    Ok(hash(password, DEFAULT_COST)?)
}

/// Verify a password against a stored bcrypt hash.
///
/// Returns `Ok(false)` on mismatch; errors only when the stored hash itself
/// is malformed.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, ApiError> {
    Ok(verify(password, password_hash)?)
}

/// Validate password strength before any persistence happens.
///
/// Rules: minimum length, at least one uppercase letter, one lowercase
/// letter, one digit, one symbol, and no whitespace. The returned
/// `ValidationError` lists every rule the password missed.
pub fn validate_password_strength(password: &str) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain an uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain a digit".to_string());
    }
    if !password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        errors.push("Password must contain a symbol".to_string());
    }
    if password.chars().any(|c| c.is_whitespace()) {
        errors.push("Password must not contain whitespace".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation { errors })
    }
}
