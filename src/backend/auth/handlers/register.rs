/**
 * Registration Handler
 *
 * POST /api/auth/register — create an account and open its first session.
 *
 * # Process
 *
 * 1. Validate username, email, display name, and password strength
 * 2. Optionally enroll a TOTP second factor (seed returned exactly once)
 * 3. Persist the user and open a session
 * 4. Return the access token in the body and the refresh token in an
 *    HttpOnly cookie scoped to /api/auth
 *
 * # Errors
 *
 * * `400 Bad Request` - Validation failed; every unmet rule is listed
 * * `409 Conflict` - Username or email taken (without saying which)
 */
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{AppendHeaders, IntoResponse, Json};
use std::sync::Arc;

use crate::backend::auth::handlers::types::{AuthResponse, RegisterRequest};
use crate::backend::auth::handlers::{client_meta, refresh_cookie};
use crate::backend::auth::manager::{RegisterInput, SessionManager};
use crate::backend::error::ApiError;
use crate::shared::dto::ApiResponse;

pub async fn register(
    State(sessions): State<Arc<SessionManager>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Registration request for: {}", request.username);

    let result = sessions
        .register(
            RegisterInput {
                username: request.username,
                email: request.email,
                display_name: request.display_name,
                password: request.password,
                enable_2fa: request.enable_2fa,
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
            two_factor: result.enrollment,
        })),
    ))
}
