/**
 * PostgreSQL Message Store
 *
 * `MessageStore` implementation over sqlx. The monotonic status update is a
 * single conditional upsert: the ordinal comparison runs inside the
 * statement's WHERE clause, so the compare-and-swap is atomic at the row
 * level and safe under concurrent delivery/read reports for one pair.
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::backend::delivery::store::{
    ConversationRecord, MemberRole, MessageRecord, MessageStore, NewMessage, ParticipantRecord,
    StatusRecord, StatusSeed,
};
use crate::backend::error::StoreError;
use crate::shared::dto::DeliveryState;

pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, message_type, reply_to, \
     is_edited, is_deleted, created_at, updated_at";

const STATUS_COLUMNS: &str =
    "message_id, user_id, status, reaction, delivered_at, read_at, updated_at";

// Maps the stored status text onto the ordering used by the monotonic
// check. `pending` and `sent` share the lowest rung.
const STATUS_ORDINAL_SQL: &str =
    "CASE {col} WHEN 'delivered' THEN 1 WHEN 'read' THEN 2 ELSE 0 END";

fn ordinal_expr(column: &str) -> String {
    STATUS_ORDINAL_SQL.replace("{col}", column)
}

fn message_from_row(row: &sqlx::postgres::PgRow) -> MessageRecord {
    MessageRecord {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        message_type: row.get("message_type"),
        reply_to: row.get("reply_to"),
        is_edited: row.get("is_edited"),
        is_deleted: row.get("is_deleted"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn status_from_row(row: &sqlx::postgres::PgRow) -> StatusRecord {
    StatusRecord {
        message_id: row.get("message_id"),
        user_id: row.get("user_id"),
        status: DeliveryState::from_str(row.get::<String, _>("status").as_str())
            .unwrap_or(DeliveryState::Pending),
        reaction: row.get("reaction"),
        delivered_at: row.get("delivered_at"),
        read_at: row.get("read_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn create_conversation(
        &self,
        name: Option<String>,
        is_group: bool,
        members: Vec<(Uuid, MemberRole)>,
    ) -> Result<ConversationRecord, StoreError> {
        let mut tx = self.pool.begin().await?;
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO conversations (id, name, is_group, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, is_group, created_at
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(is_group)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for (user_id, role) in &members {
            sqlx::query(
                r#"
                INSERT INTO conversation_members (conversation_id, user_id, role, joined_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(id)
            .bind(user_id)
            .bind(role.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(ConversationRecord {
            id: row.get("id"),
            name: row.get("name"),
            is_group: row.get("is_group"),
            created_at: row.get("created_at"),
        })
    }

    async fn conversation_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 AS one FROM conversations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn participants(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<ParticipantRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, role
            FROM conversation_members
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ParticipantRecord {
                user_id: row.get("user_id"),
                role: MemberRole::from_str(row.get::<String, _>("role").as_str())
                    .unwrap_or(MemberRole::Member),
            })
            .collect())
    }

    async fn conversations_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT conversation_id
            FROM conversation_members
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("conversation_id")).collect())
    }

    async fn insert_message(&self, message: NewMessage) -> Result<MessageRecord, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, content, message_type,
                                  reply_to, is_edited, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, FALSE, $7, $7)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(&message.message_type)
        .bind(message.reply_to)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(message_from_row(&row))
    }

    async fn remove_message(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM message_status WHERE message_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_statuses(
        &self,
        message_id: Uuid,
        seeds: &[StatusSeed],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        for seed in seeds {
            sqlx::query(
                r#"
                INSERT INTO message_status (message_id, user_id, status, reaction,
                                            delivered_at, read_at, updated_at)
                VALUES ($1, $2, $3, NULL, NULL, NULL, $4)
                "#,
            )
            .bind(message_id)
            .bind(seed.user_id)
            .bind(seed.status.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_message(&self, id: Uuid) -> Result<Option<MessageRecord>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(message_from_row))
    }

    async fn find_status(
        &self,
        message_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<StatusRecord>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {STATUS_COLUMNS}
            FROM message_status
            WHERE message_id = $1 AND user_id = $2
            "#
        ))
        .bind(message_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(status_from_row))
    }

    async fn advance_status(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        target: DeliveryState,
        at: DateTime<Utc>,
    ) -> Result<StatusRecord, StoreError> {
        // Single-statement compare-and-swap. The DO UPDATE branch fires only
        // when the target ordinal strictly exceeds the stored one; COALESCE
        // keeps delivered_at/read_at at their first-crossing values and
        // backfills delivered_at when read arrives first.
        let sql = format!(
            r#"
            INSERT INTO message_status (message_id, user_id, status, reaction,
                                        delivered_at, read_at, updated_at)
            VALUES ($1, $2, $3, NULL,
                    CASE WHEN $3 IN ('delivered', 'read') THEN $4 END,
                    CASE WHEN $3 = 'read' THEN $4 END,
                    $4)
            ON CONFLICT (message_id, user_id) DO UPDATE
            SET status = EXCLUDED.status,
                delivered_at = COALESCE(message_status.delivered_at, EXCLUDED.delivered_at),
                read_at = COALESCE(message_status.read_at, EXCLUDED.read_at),
                updated_at = EXCLUDED.updated_at
            WHERE {current} < {target}
            RETURNING {STATUS_COLUMNS}
            "#,
            current = ordinal_expr("message_status.status"),
            target = ordinal_expr("EXCLUDED.status"),
        );

        let row = sqlx::query(&sql)
            .bind(message_id)
            .bind(user_id)
            .bind(target.as_str())
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(status_from_row(&row)),
            // The guard rejected the transition: return the unchanged row.
            None => self
                .find_status(message_id, user_id)
                .await?
                .ok_or(StoreError::NotFound),
        }
    }

    async fn set_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
        at: DateTime<Utc>,
    ) -> Result<StatusRecord, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO message_status (message_id, user_id, status, reaction,
                                        delivered_at, read_at, updated_at)
            VALUES ($1, $2, 'pending', $3, NULL, NULL, $4)
            ON CONFLICT (message_id, user_id) DO UPDATE
            SET reaction = EXCLUDED.reaction,
                updated_at = EXCLUDED.updated_at
            RETURNING {STATUS_COLUMNS}
            "#
        ))
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(status_from_row(&row))
    }

    async fn update_message_content(
        &self,
        id: Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<MessageRecord, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE messages
            SET content = $1, is_edited = TRUE, updated_at = $2
            WHERE id = $3
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(content)
        .bind(at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(message_from_row).ok_or(StoreError::NotFound)
    }

    async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_deleted = TRUE, updated_at = $1
            WHERE id = $2
            "#,
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MessageRecord>, i64), StoreError> {
        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM messages
            WHERE conversation_id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?
        .get("total");

        let rows = sqlx::query(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE conversation_id = $1 AND is_deleted = FALSE
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(conversation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.iter().map(message_from_row).collect(), total))
    }
}
