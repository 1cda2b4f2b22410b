/**
 * Backend Error Types
 *
 * This module defines the error taxonomy for the core. Each variant carries
 * a stable machine-readable code plus a human message, so clients can branch
 * on the code and show the message.
 *
 * # Design Notes
 *
 * - `Unauthorized` renders the same message regardless of *why* the check
 *   failed (unknown identifier, wrong password, stale rotation), so the
 *   response never confirms whether an account exists.
 * - `TwoFactorRequired` and `InvalidTwoFactorCode` are deliberately distinct
 *   from `Unauthorized` so the client can re-prompt for a code.
 * - `Conflict` never names the colliding field, for the same
 *   anti-enumeration reason.
 */
use axum::http::StatusCode;
use thiserror::Error;

/// Errors produced by the storage interfaces.
///
/// Stores translate their backend-specific failures (unique violations,
/// connection errors) into this small vocabulary; the engine maps it onto
/// the API taxonomy.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness violation (duplicate username/email, duplicate status row).
    #[error("conflict")]
    Conflict,
    /// Row that an operation requires does not exist.
    #[error("not found")]
    NotFound,
    /// Anything else from the storage backend.
    #[error("storage error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Error taxonomy surfaced to API callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input. Safe to show field-level detail; carries
    /// every unmet rule, not just the first one.
    #[error("{}", errors.join("; "))]
    Validation { errors: Vec<String> },

    /// Missing, invalid, or expired credential, or a failed password/refresh
    /// match. Always the same message regardless of cause.
    #[error("Invalid credentials")]
    Unauthorized,

    /// Account has a second factor enabled and no code was supplied.
    #[error("Two-factor authentication code required")]
    TwoFactorRequired,

    /// Supplied second-factor code did not match within the allowed window.
    #[error("Invalid two-factor authentication code")]
    InvalidTwoFactorCode,

    /// Authenticated but not permitted.
    #[error("{0}")]
    Forbidden(String),

    /// Duplicate handle or contact address. Does not reveal which.
    #[error("An account with these details already exists")]
    Conflict,

    /// Unknown message or conversation.
    #[error("{0}")]
    NotFound(String),

    /// Too many attempts in a window; carries a retry-after hint in seconds.
    #[error("Too many attempts, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Anything unexpected. The detail is logged, never exposed.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    /// Convenience constructor for a single-rule validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            errors: vec![message.into()],
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::TwoFactorRequired => "TWO_FACTOR_REQUIRED",
            Self::InvalidTwoFactorCode => "INVALID_TWO_FACTOR_CODE",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized
            | Self::TwoFactorRequired
            | Self::InvalidTwoFactorCode => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => ApiError::Conflict,
            StoreError::NotFound => ApiError::NotFound("Resource not found".to_string()),
            StoreError::Backend(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ApiError::Internal(format!("password hashing failed: {err}"))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("serialization failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_joins_all_rules() {
        let error = ApiError::Validation {
            errors: vec!["too short".to_string(), "needs a digit".to_string()],
        };
        assert_eq!(error.to_string(), "too short; needs a digit");
        assert_eq!(error.code(), "VALIDATION_ERROR");
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unauthorized_message_is_generic() {
        // Same message no matter the cause; nothing about accounts or passwords.
        let error = ApiError::Unauthorized;
        assert_eq!(error.to_string(), "Invalid credentials");
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_two_factor_variants_are_distinct() {
        assert_ne!(
            ApiError::TwoFactorRequired.code(),
            ApiError::Unauthorized.code()
        );
        assert_ne!(
            ApiError::InvalidTwoFactorCode.code(),
            ApiError::TwoFactorRequired.code()
        );
    }

    #[test]
    fn test_conflict_does_not_name_field() {
        let error = ApiError::Conflict;
        assert!(!error.to_string().contains("username"));
        assert!(!error.to_string().contains("email"));
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_rate_limited_carries_hint() {
        let error = ApiError::RateLimited {
            retry_after_secs: 42,
        };
        assert!(error.to_string().contains("42"));
        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            ApiError::from(StoreError::Conflict),
            ApiError::Conflict
        ));
        assert!(matches!(
            ApiError::from(StoreError::Backend("boom".to_string())),
            ApiError::Internal(_)
        ));
    }
}
