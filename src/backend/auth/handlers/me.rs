/**
 * Current User Handler
 *
 * GET /api/auth/me — return the authenticated user's sanitized profile.
 * Requires a valid access token (enforced by the auth middleware).
 */
use axum::extract::State;
use axum::response::Json;
use std::sync::Arc;

use crate::backend::auth::manager::SessionManager;
use crate::backend::error::ApiError;
use crate::backend::middleware::auth::AuthUser;
use crate::shared::dto::{ApiResponse, UserDto};

pub async fn me(
    State(sessions): State<Arc<SessionManager>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let profile = sessions.me(user.user_id).await?;
    Ok(Json(ApiResponse::ok(profile)))
}
