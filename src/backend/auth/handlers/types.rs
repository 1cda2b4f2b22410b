/**
 * Auth Request/Response Types
 *
 * Wire shapes for the /api/auth endpoints. Response types embed the
 * sanitized `UserDto`; nothing here ever carries a password hash or a
 * stored 2FA seed.
 */
use serde::{Deserialize, Serialize};

use crate::backend::auth::twofactor::TotpEnrollment;
use crate::shared::dto::UserDto;

/// Name of the HttpOnly cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "veilchat_refresh";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password: String,
    #[serde(default)]
    pub enable_2fa: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub identifier: String,
    pub password: String,
    pub totp_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserDto,
    /// Present only in the registration response when 2FA was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub two_factor: Option<TotpEnrollment>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}
