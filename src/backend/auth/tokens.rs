/**
 * Access and Refresh Tokens
 *
 * This module mints and verifies the two JWT kinds used by the core:
 *
 * - Access tokens: short-lived, bind to a user id, never persisted.
 *   Validity is purely signature + expiry, checked on every authenticated
 *   request and at connection time.
 * - Refresh tokens: long-lived, bind to a user id and a session id,
 *   persisted server-side only as a SHA-256 hash. Single use: every
 *   successful refresh rotates the session.
 *
 * Each token carries a `typ` claim so one kind can never be presented in
 * place of the other.
 */
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

const TOKEN_TYPE_ACCESS: &str = "access";
const TOKEN_TYPE_REFRESH: &str = "refresh";

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User ID
    pub sub: String,
    /// Username, for display without a store round trip
    pub username: String,
    /// Token type tag ("access")
    pub typ: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

/// Claims carried by a refresh token.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// User ID
    pub sub: String,
    /// Session ID this token belongs to
    pub sid: String,
    /// Token type tag ("refresh")
    pub typ: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token verification failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("wrong token type")]
    WrongType,
    #[error("malformed claim: {0}")]
    MalformedClaim(String),
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Mint an access token for a user.
pub fn issue_access_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    ttl_secs: u64,
) -> Result<String, TokenError> {
    let now = now_unix();
    let claims = AccessClaims {
        sub: user_id.to_string(),
        username: username.to_string(),
        typ: TOKEN_TYPE_ACCESS.to_string(),
        exp: now + ttl_secs,
        iat: now,
    };
    let key = EncodingKey::from_secret(secret.as_ref());
    Ok(encode(&Header::default(), &claims, &key)?)
}

/// Mint a refresh token bound to a session.
pub fn issue_refresh_token(
    secret: &str,
    user_id: Uuid,
    session_id: Uuid,
    ttl_secs: u64,
) -> Result<String, TokenError> {
    let now = now_unix();
    let claims = RefreshClaims {
        sub: user_id.to_string(),
        sid: session_id.to_string(),
        typ: TOKEN_TYPE_REFRESH.to_string(),
        exp: now + ttl_secs,
        iat: now,
    };
    let key = EncodingKey::from_secret(secret.as_ref());
    Ok(encode(&Header::default(), &claims, &key)?)
}

/// Verify an access token: signature, expiry, and type tag.
pub fn verify_access_token(secret: &str, token: &str) -> Result<AccessClaims, TokenError> {
    let key = DecodingKey::from_secret(secret.as_ref());
    let data = decode::<AccessClaims>(token, &key, &Validation::default())?;
    if data.claims.typ != TOKEN_TYPE_ACCESS {
        return Err(TokenError::WrongType);
    }
    Ok(data.claims)
}

/// Verify a refresh token: signature, expiry, and type tag.
pub fn verify_refresh_token(secret: &str, token: &str) -> Result<RefreshClaims, TokenError> {
    let key = DecodingKey::from_secret(secret.as_ref());
    let data = decode::<RefreshClaims>(token, &key, &Validation::default())?;
    if data.claims.typ != TOKEN_TYPE_REFRESH {
        return Err(TokenError::WrongType);
    }
    Ok(data.claims)
}

/// Extract the user id from verified access claims.
pub fn user_id_from_access(claims: &AccessClaims) -> Result<Uuid, TokenError> {
    Uuid::parse_str(&claims.sub).map_err(|e| TokenError::MalformedClaim(e.to_string()))
}

/// Hash a refresh token for at-rest storage. The plaintext token never
/// touches the store; presenting one must hash-match the session row.
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
