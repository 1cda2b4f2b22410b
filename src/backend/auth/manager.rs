/**
 * Session Manager
 *
 * Issues short-lived access tokens and long-lived rotating refresh tokens;
 * owns session create/rotate/revoke logic. Request-scoped and stateless
 * aside from the credential store and the login throttle.
 *
 * # Rotation
 *
 * Refresh tokens are single-use. A successful `refresh` atomically revokes
 * the presented session and issues a brand-new session plus token pair.
 * Two callers racing on the same token are decided by the store's
 * `revoke_session`: the loser sees `UnauthorizedError` and must treat it as
 * a logout.
 */
use chrono::{Duration, Utc};
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::backend::auth::password::{
    hash_password, validate_password_strength, verify_password,
};
use crate::backend::auth::store::{CredentialStore, NewSession, NewUser, UserRecord};
use crate::backend::auth::tokens::{
    hash_refresh_token, issue_access_token, issue_refresh_token, verify_refresh_token,
};
use crate::backend::auth::twofactor::{
    decrypt_seed, encrypt_seed, generate_enrollment, verify_code, TotpEnrollment,
};
use crate::backend::error::ApiError;
use crate::shared::dto::UserDto;

/// Login attempts allowed per identifier per minute.
const LOGIN_ATTEMPTS_PER_MINUTE: u32 = 10;

type LoginLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Registration input.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password: String,
    pub enable_2fa: bool,
}

/// Login input.
#[derive(Debug, Clone)]
pub struct LoginInput {
    /// Username or email.
    pub identifier: String,
    pub password: String,
    pub totp_code: Option<String>,
}

/// Client metadata recorded on the session row.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub device_info: Option<String>,
    pub ip: Option<String>,
}

/// Access + refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful register or login.
#[derive(Debug, Clone)]
pub struct AuthSuccess {
    pub user: UserDto,
    pub tokens: TokenPair,
    /// Present exactly once, at registration with 2FA enabled. The seed is
    /// never retrievable in plaintext afterwards.
    pub enrollment: Option<TotpEnrollment>,
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    jwt_secret: String,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
    totp_key: [u8; 32],
    login_limiter: LoginLimiter,
    clock: DefaultClock,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn is_valid_username(username: &str) -> bool {
    if username.len() < 3 || username.len() > 30 {
        return false;
    }
    let mut chars = username.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        jwt_secret: String,
        access_ttl_secs: u64,
        refresh_ttl_secs: u64,
        totp_key: [u8; 32],
    ) -> Self {
        let quota = Quota::per_minute(
            NonZeroU32::new(LOGIN_ATTEMPTS_PER_MINUTE).expect("nonzero quota"),
        );
        Self {
            store,
            jwt_secret,
            access_ttl_secs,
            refresh_ttl_secs,
            totp_key,
            login_limiter: RateLimiter::keyed(quota),
            clock: DefaultClock::default(),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    pub fn refresh_ttl_secs(&self) -> u64 {
        self.refresh_ttl_secs
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Register a new account.
    ///
    /// Validates every input rule before any persistence; fails with a
    /// `ValidationError` listing all unmet rules. Duplicate username or
    /// email fails with a `ConflictError` that does not reveal which field
    /// collided.
    pub async fn register(
        &self,
        input: RegisterInput,
        meta: ClientMeta,
    ) -> Result<AuthSuccess, ApiError> {
        let username = input.username.trim().to_lowercase();
        let email = input.email.trim().to_lowercase();

        let mut errors = Vec::new();
        if !is_valid_username(&username) {
            errors.push(
                "Username must be 3-30 characters, start with a letter, and contain only \
                 letters, numbers, and underscores"
                    .to_string(),
            );
        }
        if !email.contains('@') {
            errors.push("Invalid email format".to_string());
        }
        if input.display_name.trim().is_empty() {
            errors.push("Display name must not be empty".to_string());
        }
        if let Err(ApiError::Validation {
            errors: password_errors,
        }) = validate_password_strength(&input.password)
        {
            errors.extend(password_errors);
        }
        if !errors.is_empty() {
            return Err(ApiError::Validation { errors });
        }

        let password_hash = hash_password(&input.password)?;

        let enrollment = if input.enable_2fa {
            Some(generate_enrollment(&email))
        } else {
            None
        };
        let totp_seed_enc = match &enrollment {
            Some(e) => Some(encrypt_seed(&self.totp_key, &e.seed)?),
            None => None,
        };

        let user = self
            .store
            .create_user(NewUser {
                username,
                email,
                display_name: input.display_name.trim().to_string(),
                password_hash,
                totp_enabled: input.enable_2fa,
                totp_seed_enc,
            })
            .await?;

        tracing::info!("registered user {} ({})", user.username, user.id);

        let tokens = self.open_session(&user, &meta).await?;
        Ok(AuthSuccess {
            user: user.to_dto(),
            tokens,
            enrollment,
        })
    }

    /// Authenticate with identifier + password (+ optional TOTP code).
    ///
    /// Unknown identifier and wrong password produce the same
    /// `UnauthorizedError`. Accounts with a second factor and no supplied
    /// code get the distinguishable `TwoFactorRequired` signal.
    pub async fn login(
        &self,
        input: LoginInput,
        meta: ClientMeta,
    ) -> Result<AuthSuccess, ApiError> {
        let identifier = input.identifier.trim().to_lowercase();

        if let Err(not_until) = self.login_limiter.check_key(&identifier) {
            let wait = not_until.wait_time_from(self.clock.now());
            return Err(ApiError::RateLimited {
                retry_after_secs: wait.as_secs().max(1),
            });
        }

        let user = self
            .store
            .find_user_by_identifier(&identifier)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if !user.is_active {
            tracing::warn!("login attempt for deactivated user {}", user.id);
            return Err(ApiError::Unauthorized);
        }

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::warn!("failed password for user {}", user.id);
            return Err(ApiError::Unauthorized);
        }

        if user.totp_enabled {
            let code = match input.totp_code.as_deref() {
                Some(code) if !code.trim().is_empty() => code.trim(),
                _ => return Err(ApiError::TwoFactorRequired),
            };
            let seed_enc = user
                .totp_seed_enc
                .as_deref()
                .ok_or_else(|| ApiError::Internal("2FA enabled without a seed".to_string()))?;
            let seed = decrypt_seed(&self.totp_key, seed_enc)?;
            if !verify_code(&seed, code, now_unix()) {
                return Err(ApiError::InvalidTwoFactorCode);
            }
        }

        tracing::info!("user {} logged in", user.id);

        let tokens = self.open_session(&user, &meta).await?;
        Ok(AuthSuccess {
            user: user.to_dto(),
            tokens,
            enrollment: None,
        })
    }

    /// Rotate a refresh token.
    ///
    /// Any failure at any step yields `UnauthorizedError`; the caller must
    /// treat that as a logout and discard cached refresh material.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        meta: ClientMeta,
    ) -> Result<TokenPair, ApiError> {
        let claims = verify_refresh_token(&self.jwt_secret, refresh_token)
            .map_err(|_| ApiError::Unauthorized)?;
        let session_id = Uuid::parse_str(&claims.sid).map_err(|_| ApiError::Unauthorized)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthorized)?;

        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        let now = Utc::now();
        if !session.is_valid(now)
            || session.user_id != user_id
            || session.refresh_hash != hash_refresh_token(refresh_token)
        {
            return Err(ApiError::Unauthorized);
        }

        // Rotation point: exactly one concurrent caller wins this revocation;
        // the loser is told its session is gone.
        if !self.store.revoke_session(session_id, now).await? {
            tracing::warn!("refresh race lost for session {}", session_id);
            return Err(ApiError::Unauthorized);
        }

        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(ApiError::Unauthorized)?;

        self.open_session(&user, &meta).await
    }

    /// Best-effort logout. Invalid or missing tokens are silently tolerated;
    /// logout never fails visibly.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let Some(token) = refresh_token else {
            return;
        };
        let Ok(claims) = verify_refresh_token(&self.jwt_secret, token) else {
            return;
        };
        let Ok(session_id) = Uuid::parse_str(&claims.sid) else {
            return;
        };
        match self.store.find_session(session_id).await {
            Ok(Some(session)) if session.refresh_hash == hash_refresh_token(token) => {
                if let Err(e) = self.store.revoke_session(session_id, Utc::now()).await {
                    tracing::warn!("logout revocation failed for {}: {}", session_id, e);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("logout lookup failed for {}: {}", session_id, e),
        }
    }

    /// Fetch the authenticated user's profile, sanitized.
    pub async fn me(&self, user_id: Uuid) -> Result<UserDto, ApiError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;
        Ok(user.to_dto())
    }

    /// Create a session row and mint its token pair.
    async fn open_session(
        &self,
        user: &UserRecord,
        meta: &ClientMeta,
    ) -> Result<TokenPair, ApiError> {
        let session_id = Uuid::new_v4();
        let refresh_token = issue_refresh_token(
            &self.jwt_secret,
            user.id,
            session_id,
            self.refresh_ttl_secs,
        )
        .map_err(|e| ApiError::Internal(e.to_string()))?;

        self.store
            .create_session(NewSession {
                id: session_id,
                user_id: user.id,
                refresh_hash: hash_refresh_token(&refresh_token),
                device_info: meta.device_info.clone(),
                ip: meta.ip.clone(),
                expires_at: Utc::now() + Duration::seconds(self.refresh_ttl_secs as i64),
            })
            .await?;

        let access_token = issue_access_token(
            &self.jwt_secret,
            user.id,
            &user.username,
            self.access_ttl_secs,
        )
        .map_err(|e| ApiError::Internal(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}
