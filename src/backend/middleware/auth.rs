/**
 * Authentication Middleware
 *
 * Protects routes that require a valid access token. Extracts the bearer
 * token from the Authorization header, verifies signature/expiry/type, and
 * attaches the authenticated user to the request extensions for handlers.
 */
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::backend::auth::tokens::{user_id_from_access, verify_access_token};
use crate::backend::error::ApiError;
use crate::backend::server::state::AppState;

/// Authenticated user data extracted from the access token.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
}

/// Authentication middleware
///
/// 1. Extracts the bearer token from the Authorization header
/// 2. Verifies it as an access token (never accepts a refresh token)
/// 3. Confirms the user still exists and is active
/// 4. Attaches `AuthenticatedUser` to the request extensions
///
/// Returns 401 with the generic unauthorized body on any failure.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let claims = verify_access_token(state.sessions.jwt_secret(), token).map_err(|e| {
        tracing::warn!("invalid access token: {}", e);
        ApiError::Unauthorized
    })?;
    let user_id = user_id_from_access(&claims).map_err(|_| ApiError::Unauthorized)?;

    // Token validity alone is not enough: the account must still be live.
    match state.sessions.store().find_user_by_id(user_id).await? {
        Some(user) if user.is_active => {}
        _ => return Err(ApiError::Unauthorized),
    }

    request.extensions_mut().insert(AuthenticatedUser {
        user_id,
        username: claims.username,
    });

    Ok(next.run(request).await)
}

/// Axum extractor for the authenticated user placed by `auth_middleware`.
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedUser);

impl axum::extract::FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                tracing::warn!("AuthenticatedUser not found in request extensions");
                ApiError::Unauthorized
            })?;

        Ok(AuthUser(user))
    }
}
