/**
 * Credential Store Interface
 *
 * Durable storage for user records and session records, consumed by the
 * session manager as an interface. Two implementations ship with the crate:
 * a PostgreSQL store (`postgres.rs`) and an in-memory store used for tests
 * and for running without a configured database.
 *
 * # Invariants enforced here
 *
 * - Usernames and emails are unique after case normalization; violations
 *   surface as `StoreError::Conflict`.
 * - A session's `refresh_hash` is immutable after creation: the interface
 *   offers no operation that rewrites it.
 * - `revoke_session` reports whether *this* call performed the revocation,
 *   which is what makes refresh rotation a race with exactly one winner.
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::backend::error::StoreError;
use crate::shared::dto::{Presence, UserDto};

/// A user row as the store sees it. Carries sensitive fields; convert to
/// `UserDto` before anything leaves the backend.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub totp_enabled: bool,
    /// AES-GCM encrypted seed, `base64(nonce || ciphertext)`.
    pub totp_seed_enc: Option<String>,
    pub is_active: bool,
    pub presence: Presence,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Strip sensitive fields for the API boundary.
    pub fn to_dto(&self) -> UserDto {
        UserDto {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            totp_enabled: self.totp_enabled,
            presence: self.presence,
            last_seen: self.last_seen,
            created_at: self.created_at,
        }
    }
}

/// Input for creating a user. Username and email must already be
/// case-normalized by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub totp_enabled: bool,
    pub totp_seed_enc: Option<String>,
}

/// A session row. `refresh_hash` is the SHA-256 of the refresh token; the
/// plaintext token never reaches the store.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_hash: String,
    pub device_info: Option<String>,
    pub ip: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// A session is valid iff it has not been revoked and has not expired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// Input for creating a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_hash: String,
    pub device_info: Option<String>,
    pub ip: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Durable storage for users and sessions.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create a user. Fails with `StoreError::Conflict` when the username or
    /// email already exists (the caller must not reveal which).
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// Look up a user by username *or* email, case-insensitively.
    async fn find_user_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<UserRecord>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    /// Update presence and optionally last-seen. Mutated by the gateway only.
    async fn set_presence(
        &self,
        user_id: Uuid,
        presence: Presence,
        last_seen: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    async fn create_session(&self, session: NewSession) -> Result<SessionRecord, StoreError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError>;

    /// Revoke a session. Returns `true` iff the session existed and was not
    /// already revoked, i.e. this caller won the revocation. Concurrent
    /// callers racing on one session see exactly one `true`.
    async fn revoke_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;
}

/// In-memory credential store. Backs tests and database-less operation.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<MemoryCredentialInner>,
}

#[derive(Default)]
struct MemoryCredentialInner {
    users: HashMap<Uuid, UserRecord>,
    sessions: HashMap<Uuid, SessionRecord>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let taken = inner
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if taken {
            return Err(StoreError::Conflict);
        }
        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            password_hash: user.password_hash,
            totp_enabled: user.totp_enabled,
            totp_seed_enc: user.totp_seed_enc,
            is_active: true,
            presence: Presence::Offline,
            last_seen: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let needle = identifier.to_lowercase();
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| u.username == needle || u.email == needle)
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.get(&id).cloned())
    }

    async fn set_presence(
        &self,
        user_id: Uuid,
        presence: Presence,
        last_seen: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.presence = presence;
        if last_seen.is_some() {
            user.last_seen = last_seen;
        }
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn create_session(&self, session: NewSession) -> Result<SessionRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.sessions.contains_key(&session.id) {
            return Err(StoreError::Conflict);
        }
        let record = SessionRecord {
            id: session.id,
            user_id: session.user_id,
            refresh_hash: session.refresh_hash,
            device_info: session.device_info,
            ip: session.ip,
            expires_at: session.expires_at,
            revoked_at: None,
            created_at: Utc::now(),
        };
        inner.sessions.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sessions.get(&id).cloned())
    }

    async fn revoke_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.sessions.get_mut(&id) {
            Some(session) if session.revoked_at.is_none() => {
                session.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
