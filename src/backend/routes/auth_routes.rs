/**
 * Auth Routes
 *
 * Route tables for the /api/auth endpoints.
 *
 * # Routes
 *
 * Public (no access token needed):
 * - `POST /api/auth/register` - Create an account
 * - `POST /api/auth/login` - Authenticate
 * - `POST /api/auth/refresh` - Rotate the refresh cookie
 * - `POST /api/auth/logout` - Revoke the session (always succeeds)
 *
 * Protected (valid access token required):
 * - `GET /api/auth/me` - Current user profile
 */
use axum::routing::{get, post};
use axum::Router;

use crate::backend::auth::handlers::{login, logout, me, refresh, register};
use crate::backend::server::state::AppState;

/// Auth routes reachable without an access token.
pub fn public_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register::register))
        .route("/api/auth/login", post(login::login))
        .route("/api/auth/refresh", post(refresh::refresh))
        .route("/api/auth/logout", post(logout::logout))
}

/// Auth routes behind the access-token middleware.
pub fn protected_auth_routes() -> Router<AppState> {
    Router::new().route("/api/auth/me", get(me::me))
}
