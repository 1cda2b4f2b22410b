/**
 * Message Delivery Engine
 *
 * Owns the message lifecycle: send, per-recipient status progression,
 * reactions, edit, soft delete, and history.
 *
 * # Atomicity of send
 *
 * Persisting the message and creating one status row per participant is an
 * all-or-nothing unit. The engine inserts the message, then writes the
 * status rows; if that second step fails, the inserted message is removed
 * again before the error is surfaced, so no status-less message survives.
 *
 * # Monotonic progression
 *
 * Status values only ever move forward in the ordering
 * `pending/sent < delivered < read`. The compare-and-swap lives in the
 * store; the engine adds the permission and existence checks around it.
 */
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::delivery::store::{
    MemberRole, MessageStore, NewMessage, ParticipantRecord, StatusSeed,
};
use crate::backend::error::ApiError;
use crate::shared::dto::{DeliveryState, MessageDto, ReactionDto, StatusDto};

/// Hard cap on history page size.
pub const MAX_HISTORY_LIMIT: i64 = 100;
/// Longest accepted reaction payload, matching the column width.
const MAX_REACTION_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct SendInput {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: String,
    pub reply_to: Option<Uuid>,
}

/// One history page: ascending messages plus the conversation's total.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub messages: Vec<MessageDto>,
    pub total: i64,
}

pub struct DeliveryEngine {
    store: Arc<dyn MessageStore>,
}

impl DeliveryEngine {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Participants of a conversation, failing when it does not exist or
    /// when `user_id` is not a member.
    async fn require_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ParticipantRecord>, ApiError> {
        if !self.store.conversation_exists(conversation_id).await? {
            return Err(ApiError::NotFound("Conversation not found".to_string()));
        }
        let participants = self.store.participants(conversation_id).await?;
        if !participants.iter().any(|p| p.user_id == user_id) {
            return Err(ApiError::Forbidden(
                "Not a participant of this conversation".to_string(),
            ));
        }
        Ok(participants)
    }

    /// Persist a message and seed its delivery-status rows.
    ///
    /// The sender's row starts at `sent`, every other participant's at
    /// `pending`. If status seeding fails the message insert is undone.
    pub async fn send(&self, input: SendInput) -> Result<MessageDto, ApiError> {
        if input.content.trim().is_empty() {
            return Err(ApiError::validation("Message content must not be empty"));
        }
        let participants = self
            .require_participant(input.conversation_id, input.sender_id)
            .await?;

        let message = self
            .store
            .insert_message(NewMessage {
                conversation_id: input.conversation_id,
                sender_id: input.sender_id,
                content: input.content,
                message_type: input.message_type,
                reply_to: input.reply_to,
            })
            .await?;

        let seeds: Vec<StatusSeed> = participants
            .iter()
            .map(|p| StatusSeed {
                user_id: p.user_id,
                status: if p.user_id == input.sender_id {
                    DeliveryState::Sent
                } else {
                    DeliveryState::Pending
                },
            })
            .collect();

        if let Err(e) = self.store.create_statuses(message.id, &seeds).await {
            // Compensate: no status rows means the message must not exist.
            tracing::error!("status seeding failed for message {}: {}", message.id, e);
            if let Err(cleanup) = self.store.remove_message(message.id).await {
                tracing::error!("rollback of message {} failed: {}", message.id, cleanup);
            }
            return Err(e.into());
        }

        tracing::debug!(
            "message {} persisted with {} status rows",
            message.id,
            seeds.len()
        );
        Ok(message.to_dto())
    }

    /// Report a delivery-state target for a (message, recipient) pair.
    ///
    /// Only a target with a higher ordinal than the current row advances
    /// anything; regressive, repeated, or bottom-of-the-ordering targets
    /// (`pending`, `sent`) are silent no-ops returning the unchanged row.
    pub async fn update_status(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        target: DeliveryState,
    ) -> Result<StatusDto, ApiError> {
        let message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Message not found".to_string()))?;
        self.require_participant(message.conversation_id, user_id)
            .await?;

        let row = self
            .store
            .advance_status(message_id, user_id, target, Utc::now())
            .await?;
        Ok(row.to_dto())
    }

    /// Attach or replace a reaction. Orthogonal to delivery progression.
    pub async fn add_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> Result<ReactionDto, ApiError> {
        let emoji = emoji.trim();
        if emoji.is_empty() || emoji.len() > MAX_REACTION_LEN {
            return Err(ApiError::validation("Invalid reaction payload"));
        }
        let message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Message not found".to_string()))?;
        self.require_participant(message.conversation_id, user_id)
            .await?;

        let row = self
            .store
            .set_reaction(message_id, user_id, emoji, Utc::now())
            .await?;
        Ok(ReactionDto {
            message_id,
            user_id,
            emoji: row.reaction.unwrap_or_else(|| emoji.to_string()),
        })
    }

    /// Edit a message's content. Sender only; deleted messages are frozen.
    pub async fn edit(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        new_content: &str,
    ) -> Result<MessageDto, ApiError> {
        if new_content.trim().is_empty() {
            return Err(ApiError::validation("Message content must not be empty"));
        }
        let message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Message not found".to_string()))?;
        if message.sender_id != user_id {
            return Err(ApiError::Forbidden(
                "Only the sender may edit a message".to_string(),
            ));
        }
        if message.is_deleted {
            return Err(ApiError::validation("Cannot edit a deleted message"));
        }

        let updated = self
            .store
            .update_message_content(message_id, new_content, Utc::now())
            .await?;
        Ok(updated.to_dto())
    }

    /// Soft-delete a message. Allowed for the sender or a conversation
    /// admin; the row is retained with its deleted flag set.
    pub async fn delete(&self, message_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        let message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Message not found".to_string()))?;
        let participants = self
            .require_participant(message.conversation_id, user_id)
            .await?;

        let is_admin = participants
            .iter()
            .any(|p| p.user_id == user_id && p.role == MemberRole::Admin);
        if message.sender_id != user_id && !is_admin {
            return Err(ApiError::Forbidden(
                "Only the sender or an admin may delete a message".to_string(),
            ));
        }

        self.store.mark_deleted(message_id, Utc::now()).await?;
        tracing::info!("message {} soft-deleted by {}", message_id, user_id);
        Ok(())
    }

    /// Chronological history page for a participant. Soft-deleted messages
    /// are excluded; the limit is clamped to `1..=MAX_HISTORY_LIMIT`.
    pub async fn history(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<HistoryPage, ApiError> {
        self.require_participant(conversation_id, user_id).await?;

        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let offset = offset.max(0);
        let (messages, total) = self
            .store
            .list_messages(conversation_id, limit, offset)
            .await?;

        Ok(HistoryPage {
            messages: messages.iter().map(|m| m.to_dto()).collect(),
            total,
        })
    }
}
