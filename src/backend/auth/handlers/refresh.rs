/**
 * Refresh Handler
 *
 * POST /api/auth/refresh — rotate the refresh token presented in the
 * HttpOnly cookie and mint a new access token.
 *
 * Any failure (missing cookie, bad signature, expired, revoked, or losing a
 * concurrent-rotation race) is a single 401: the client must treat it as a
 * logout. Failures also clear the cookie so broken state cannot loop.
 */
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{AppendHeaders, IntoResponse, Json, Response};
use std::sync::Arc;

use crate::backend::auth::handlers::types::RefreshResponse;
use crate::backend::auth::handlers::{
    clear_refresh_cookie, client_meta, refresh_cookie, refresh_token_from_headers,
};
use crate::backend::auth::manager::SessionManager;
use crate::backend::error::ApiError;
use crate::shared::dto::ApiResponse;

pub async fn refresh(
    State(sessions): State<Arc<SessionManager>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, Response> {
    let unauthorized = || {
        (
            AppendHeaders([(SET_COOKIE, clear_refresh_cookie())]),
            ApiError::Unauthorized,
        )
            .into_response()
    };

    let token = refresh_token_from_headers(&headers).ok_or_else(unauthorized)?;

    let tokens = sessions
        .refresh(&token, client_meta(&headers))
        .await
        .map_err(|e| match e {
            ApiError::Unauthorized => unauthorized(),
            other => other.into_response(),
        })?;

    let cookie = refresh_cookie(&tokens.refresh_token, sessions.refresh_ttl_secs());
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(ApiResponse::ok(RefreshResponse {
            access_token: tokens.access_token,
        })),
    ))
}
