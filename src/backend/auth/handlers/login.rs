/**
 * Login Handler
 *
 * POST /api/auth/login — authenticate with username or email plus password,
 * and a TOTP code when the account has a second factor.
 *
 * # Security
 *
 * - Unknown identifier and wrong password produce the same 401; only a
 *   correct password on a 2FA account reveals the distinguishable
 *   `TWO_FACTOR_REQUIRED` signal
 * - Attempts are throttled per identifier; excess returns 429 with a
 *   Retry-After header
 * - The refresh token is set as an HttpOnly cookie, never in the body
 */
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{AppendHeaders, IntoResponse, Json};
use std::sync::Arc;

use crate::backend::auth::handlers::types::{AuthResponse, LoginRequest};
use crate::backend::auth::handlers::{client_meta, refresh_cookie};
use crate::backend::auth::manager::{LoginInput, SessionManager};
use crate::backend::error::ApiError;
use crate::shared::dto::ApiResponse;

pub async fn login(
    State(sessions): State<Arc<SessionManager>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Login request for: {}", request.identifier);

    let result = sessions
        .login(
            LoginInput {
                identifier: request.identifier,
                password: request.password,
                totp_code: request.totp_code,
            },
            client_meta(&headers),
        )
        .await?;

    let cookie = refresh_cookie(&result.tokens.refresh_token, sessions.refresh_ttl_secs());
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(ApiResponse::ok(AuthResponse {
            access_token: result.tokens.access_token,
            user: result.user,
            two_factor: None,
        })),
    ))
}
