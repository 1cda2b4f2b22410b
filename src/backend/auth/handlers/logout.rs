/**
 * Logout Handler
 *
 * POST /api/auth/logout — revoke the session behind the presented refresh
 * cookie and clear the cookie. Always returns 200: logout with a missing or
 * invalid token is a no-op, not an error.
 */
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{AppendHeaders, IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::backend::auth::handlers::{clear_refresh_cookie, refresh_token_from_headers};
use crate::backend::auth::manager::SessionManager;
use crate::shared::dto::ApiResponse;

pub async fn logout(
    State(sessions): State<Arc<SessionManager>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let token = refresh_token_from_headers(&headers);
    sessions.logout(token.as_deref()).await;

    (
        AppendHeaders([(SET_COOKIE, clear_refresh_cookie())]),
        Json(ApiResponse::ok(json!({ "logged_out": true }))),
    )
}
