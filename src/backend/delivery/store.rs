/**
 * Message Store Interface
 *
 * Durable storage for conversations, messages, and per-recipient delivery
 * status rows, consumed by the delivery engine as an interface. Ships with
 * a PostgreSQL implementation (`postgres.rs`) and an in-memory store for
 * tests and database-less operation.
 *
 * # Invariants enforced here
 *
 * - Exactly one status row per (message, recipient) pair.
 * - `advance_status` is an atomic compare-and-swap on the status ordinal:
 *   the monotonic check and the write happen under one lock (or one SQL
 *   statement), never as a read followed by a separate write.
 * - `delivered_at` / `read_at` are set exactly once, the first time their
 *   threshold is crossed; recording `read` with no prior `delivered_at`
 *   backfills it to the same instant.
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::backend::error::StoreError;
use crate::shared::dto::{DeliveryState, MessageDto, StatusDto};

/// Role of a conversation member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Member,
    Admin,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Member => "member",
            MemberRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "member" => Some(MemberRole::Member),
            "admin" => Some(MemberRole::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub name: Option<String>,
    pub is_group: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ParticipantRecord {
    pub user_id: Uuid,
    pub role: MemberRole,
}

/// A message row. Content is an opaque blob; the store never inspects it.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: String,
    pub reply_to: Option<Uuid>,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn to_dto(&self) -> MessageDto {
        MessageDto {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            content: self.content.clone(),
            message_type: self.message_type.clone(),
            reply_to: self.reply_to,
            is_edited: self.is_edited,
            is_deleted: self.is_deleted,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A delivery-status row for one (message, recipient) pair.
#[derive(Debug, Clone)]
pub struct StatusRecord {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub status: DeliveryState,
    pub reaction: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn to_dto(&self) -> StatusDto {
        StatusDto {
            message_id: self.message_id,
            user_id: self.user_id,
            status: self.status,
            reaction: self.reaction.clone(),
            delivered_at: self.delivered_at,
            read_at: self.read_at,
        }
    }
}

/// Input for inserting a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: String,
    pub reply_to: Option<Uuid>,
}

/// Initial status row for one participant, written at send time.
#[derive(Debug, Clone)]
pub struct StatusSeed {
    pub user_id: Uuid,
    pub status: DeliveryState,
}

/// Durable storage for conversations, messages, and delivery status.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_conversation(
        &self,
        name: Option<String>,
        is_group: bool,
        members: Vec<(Uuid, MemberRole)>,
    ) -> Result<ConversationRecord, StoreError>;

    async fn conversation_exists(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn participants(&self, conversation_id: Uuid)
        -> Result<Vec<ParticipantRecord>, StoreError>;

    /// All conversation ids the user is a member of. Used by the gateway to
    /// compute room joins and presence fan-out targets.
    async fn conversations_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    async fn insert_message(&self, message: NewMessage) -> Result<MessageRecord, StoreError>;

    /// Physically remove a message. Exists solely as the compensating step
    /// when status-row creation fails after a successful insert; ordinary
    /// deletion is the soft `mark_deleted`.
    async fn remove_message(&self, id: Uuid) -> Result<(), StoreError>;

    async fn create_statuses(
        &self,
        message_id: Uuid,
        seeds: &[StatusSeed],
    ) -> Result<(), StoreError>;

    async fn find_message(&self, id: Uuid) -> Result<Option<MessageRecord>, StoreError>;

    async fn find_status(
        &self,
        message_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<StatusRecord>, StoreError>;

    /// Compare-and-swap on the status ordinal. Creates the row (at
    /// `pending`) if missing, then applies `target` only when its ordinal
    /// strictly exceeds the current one; otherwise returns the unchanged
    /// row. Timestamps follow the set-exactly-once rule, with `read`
    /// backfilling `delivered_at` when absent.
    async fn advance_status(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        target: DeliveryState,
        at: DateTime<Utc>,
    ) -> Result<StatusRecord, StoreError>;

    /// Upsert the reaction on a (message, user) row without touching the
    /// delivery progression. A different emoji replaces the previous one.
    async fn set_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
        at: DateTime<Utc>,
    ) -> Result<StatusRecord, StoreError>;

    async fn update_message_content(
        &self,
        id: Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<MessageRecord, StoreError>;

    async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Page of non-deleted messages in ascending (created_at, id) order,
    /// plus the total count of non-deleted messages in the conversation.
    async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MessageRecord>, i64), StoreError>;
}

/// In-memory message store. Backs tests and database-less operation.
#[derive(Default)]
pub struct MemoryMessageStore {
    inner: Mutex<MemoryMessageInner>,
}

#[derive(Default)]
struct MemoryMessageInner {
    conversations: HashMap<Uuid, ConversationRecord>,
    members: HashMap<Uuid, Vec<ParticipantRecord>>,
    messages: HashMap<Uuid, MessageRecord>,
    statuses: HashMap<(Uuid, Uuid), StatusRecord>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_advance(row: &mut StatusRecord, target: DeliveryState, at: DateTime<Utc>) -> bool {
    if target.ordinal() <= row.status.ordinal() {
        return false;
    }
    row.status = target;
    match target {
        DeliveryState::Delivered => {
            if row.delivered_at.is_none() {
                row.delivered_at = Some(at);
            }
        }
        DeliveryState::Read => {
            if row.read_at.is_none() {
                row.read_at = Some(at);
            }
            // Reading implies delivered.
            if row.delivered_at.is_none() {
                row.delivered_at = Some(at);
            }
        }
        _ => {}
    }
    row.updated_at = at;
    true
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn create_conversation(
        &self,
        name: Option<String>,
        is_group: bool,
        members: Vec<(Uuid, MemberRole)>,
    ) -> Result<ConversationRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let record = ConversationRecord {
            id: Uuid::new_v4(),
            name,
            is_group,
            created_at: Utc::now(),
        };
        inner.members.insert(
            record.id,
            members
                .into_iter()
                .map(|(user_id, role)| ParticipantRecord { user_id, role })
                .collect(),
        );
        inner.conversations.insert(record.id, record.clone());
        Ok(record)
    }

    async fn conversation_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.lock().unwrap().conversations.contains_key(&id))
    }

    async fn participants(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<ParticipantRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .members
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn conversations_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .members
            .iter()
            .filter(|(_, members)| members.iter().any(|m| m.user_id == user_id))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn insert_message(&self, message: NewMessage) -> Result<MessageRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let record = MessageRecord {
            id: Uuid::new_v4(),
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content,
            message_type: message.message_type,
            reply_to: message.reply_to,
            is_edited: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        inner.messages.insert(record.id, record.clone());
        Ok(record)
    }

    async fn remove_message(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.messages.remove(&id);
        inner.statuses.retain(|(message_id, _), _| *message_id != id);
        Ok(())
    }

    async fn create_statuses(
        &self,
        message_id: Uuid,
        seeds: &[StatusSeed],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        for seed in seeds {
            let key = (message_id, seed.user_id);
            if inner.statuses.contains_key(&key) {
                return Err(StoreError::Conflict);
            }
            inner.statuses.insert(
                key,
                StatusRecord {
                    message_id,
                    user_id: seed.user_id,
                    status: seed.status,
                    reaction: None,
                    delivered_at: None,
                    read_at: None,
                    updated_at: now,
                },
            );
        }
        Ok(())
    }

    async fn find_message(&self, id: Uuid) -> Result<Option<MessageRecord>, StoreError> {
        Ok(self.inner.lock().unwrap().messages.get(&id).cloned())
    }

    async fn find_status(
        &self,
        message_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<StatusRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .statuses
            .get(&(message_id, user_id))
            .cloned())
    }

    async fn advance_status(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        target: DeliveryState,
        at: DateTime<Utc>,
    ) -> Result<StatusRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .statuses
            .entry((message_id, user_id))
            .or_insert_with(|| StatusRecord {
                message_id,
                user_id,
                status: DeliveryState::Pending,
                reaction: None,
                delivered_at: None,
                read_at: None,
                updated_at: at,
            });
        apply_advance(row, target, at);
        Ok(row.clone())
    }

    async fn set_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
        at: DateTime<Utc>,
    ) -> Result<StatusRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .statuses
            .entry((message_id, user_id))
            .or_insert_with(|| StatusRecord {
                message_id,
                user_id,
                status: DeliveryState::Pending,
                reaction: None,
                delivered_at: None,
                read_at: None,
                updated_at: at,
            });
        row.reaction = Some(emoji.to_string());
        row.updated_at = at;
        Ok(row.clone())
    }

    async fn update_message_content(
        &self,
        id: Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<MessageRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let message = inner.messages.get_mut(&id).ok_or(StoreError::NotFound)?;
        message.content = content.to_string();
        message.is_edited = true;
        message.updated_at = at;
        Ok(message.clone())
    }

    async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let message = inner.messages.get_mut(&id).ok_or(StoreError::NotFound)?;
        message.is_deleted = true;
        message.updated_at = at;
        Ok(())
    }

    async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MessageRecord>, i64), StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut messages: Vec<MessageRecord> = inner
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id && !m.is_deleted)
            .cloned()
            .collect();
        messages.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        let total = messages.len() as i64;
        let page = messages
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }
}
