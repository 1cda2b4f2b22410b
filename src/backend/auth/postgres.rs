/**
 * PostgreSQL Credential Store
 *
 * `CredentialStore` implementation over sqlx. Row shapes live in
 * `migrations/0001_init.sql`; uniqueness of username/email is enforced by
 * the database and surfaces as `StoreError::Conflict`.
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::backend::auth::store::{
    CredentialStore, NewSession, NewUser, SessionRecord, UserRecord,
};
use crate::backend::error::StoreError;
use crate::shared::dto::Presence;

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        password_hash: row.get("password_hash"),
        totp_enabled: row.get("totp_enabled"),
        totp_seed_enc: row.get("totp_seed_enc"),
        is_active: row.get("is_active"),
        presence: Presence::from_str(row.get::<String, _>("presence").as_str())
            .unwrap_or(Presence::Offline),
        last_seen: row.get("last_seen"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn session_from_row(row: &sqlx::postgres::PgRow) -> SessionRecord {
    SessionRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        refresh_hash: row.get("refresh_hash"),
        device_info: row.get("device_info"),
        ip: row.get("ip"),
        expires_at: row.get("expires_at"),
        revoked_at: row.get("revoked_at"),
        created_at: row.get("created_at"),
    }
}

const USER_COLUMNS: &str = "id, username, email, display_name, password_hash, totp_enabled, \
     totp_seed_enc, is_active, presence, last_seen, created_at, updated_at";

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, username, email, display_name, password_hash,
                               totp_enabled, totp_seed_enc, is_active, presence,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, 'offline', $8, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.totp_enabled)
        .bind(&user.totp_seed_enc)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user_from_row(&row))
    }

    async fn find_user_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let needle = identifier.to_lowercase();
        let row = sqlx::query(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE username = $1 OR email = $1
            "#
        ))
        .bind(&needle)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn set_presence(
        &self,
        user_id: Uuid,
        presence: Presence,
        last_seen: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET presence = $1,
                last_seen = COALESCE($2, last_seen),
                updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(presence.as_str())
        .bind(last_seen)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_session(&self, session: NewSession) -> Result<SessionRecord, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, refresh_hash, device_info, ip,
                                  expires_at, revoked_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NULL, $7)
            RETURNING id, user_id, refresh_hash, device_info, ip, expires_at,
                      revoked_at, created_at
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.refresh_hash)
        .bind(&session.device_info)
        .bind(&session.ip)
        .bind(session.expires_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(session_from_row(&row))
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, refresh_hash, device_info, ip, expires_at,
                   revoked_at, created_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(session_from_row))
    }

    async fn revoke_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        // The `revoked_at IS NULL` guard is what guarantees a single winner
        // when two refresh calls race on the same session.
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET revoked_at = $1
            WHERE id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
