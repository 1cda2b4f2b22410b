/**
 * Auth Handlers
 *
 * HTTP handlers for the /api/auth endpoints, one module per endpoint.
 * Shared helpers for the refresh-token cookie live here: the refresh token
 * travels only in an HttpOnly cookie scoped to /api/auth, so browser-side
 * script never sees it and it is not attached to ordinary API calls.
 */
use axum::http::header::{COOKIE, USER_AGENT};
use axum::http::HeaderMap;

use crate::backend::auth::manager::ClientMeta;

pub mod login;
pub mod logout;
pub mod me;
pub mod refresh;
pub mod register;
pub mod types;

pub use types::REFRESH_COOKIE;

/// Build the Set-Cookie value for a freshly issued refresh token.
pub(crate) fn refresh_cookie(token: &str, max_age_secs: u64) -> String {
    format!(
        "{REFRESH_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/api/auth; Max-Age={max_age_secs}"
    )
}

/// Build the Set-Cookie value that clears the refresh cookie.
pub(crate) fn clear_refresh_cookie() -> String {
    format!("{REFRESH_COOKIE}=; HttpOnly; SameSite=Strict; Path=/api/auth; Max-Age=0")
}

/// Pull the refresh token out of the Cookie header, if present.
pub(crate) fn refresh_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == REFRESH_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Client metadata recorded on session rows, best effort from headers.
pub(crate) fn client_meta(headers: &HeaderMap) -> ClientMeta {
    let device_info = headers
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.chars().take(255).collect());
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string());
    ClientMeta { device_info, ip }
}
