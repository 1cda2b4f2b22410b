/**
 * Message Handlers
 *
 * HTTP handlers mirroring the delivery engine operations one-to-one, plus
 * conversation creation/listing. All of them require a valid access token;
 * the engine enforces participant/sender/admin permissions.
 */
use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::delivery::engine::{DeliveryEngine, HistoryPage, SendInput};
use crate::backend::delivery::store::MemberRole;
use crate::backend::error::ApiError;
use crate::backend::gateway::Gateway;
use crate::backend::middleware::auth::AuthUser;
use crate::shared::dto::{ApiResponse, DeliveryState, MessageDto, ReactionDto, StatusDto};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub conversation_id: Uuid,
    pub content: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    pub reply_to: Option<Uuid>,
}

fn default_message_type() -> String {
    "text".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DeliveryState,
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub emoji: String,
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    pub member_ids: Vec<Uuid>,
}

#[derive(Debug, serde::Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<MessageDto>,
    pub total: i64,
}

/// POST /api/messages
///
/// Messages persisted here still reach connected sockets: the gateway fans
/// the stored message out to the conversation's online participants.
pub async fn send_message(
    State(engine): State<Arc<DeliveryEngine>>,
    State(gateway): State<Arc<Gateway>>,
    AuthUser(user): AuthUser,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let message = engine
        .send(SendInput {
            conversation_id: request.conversation_id,
            sender_id: user.user_id,
            content: request.content,
            message_type: request.message_type,
            reply_to: request.reply_to,
        })
        .await?;
    gateway.notify_message(message.clone()).await;
    Ok(Json(ApiResponse::ok(message)))
}

/// PUT /api/messages/{id}/status
pub async fn update_status(
    State(engine): State<Arc<DeliveryEngine>>,
    AuthUser(user): AuthUser,
    Path(message_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<StatusDto>>, ApiError> {
    let row = engine
        .update_status(message_id, user.user_id, request.status)
        .await?;
    Ok(Json(ApiResponse::ok(row)))
}

/// POST /api/messages/{id}/reaction
pub async fn add_reaction(
    State(engine): State<Arc<DeliveryEngine>>,
    AuthUser(user): AuthUser,
    Path(message_id): Path<Uuid>,
    Json(request): Json<ReactionRequest>,
) -> Result<Json<ApiResponse<ReactionDto>>, ApiError> {
    let reaction = engine
        .add_reaction(message_id, user.user_id, &request.emoji)
        .await?;
    Ok(Json(ApiResponse::ok(reaction)))
}

/// PUT /api/messages/{id}
pub async fn edit_message(
    State(engine): State<Arc<DeliveryEngine>>,
    AuthUser(user): AuthUser,
    Path(message_id): Path<Uuid>,
    Json(request): Json<EditMessageRequest>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let message = engine
        .edit(message_id, user.user_id, &request.content)
        .await?;
    Ok(Json(ApiResponse::ok(message)))
}

/// DELETE /api/messages/{id}
pub async fn delete_message(
    State(engine): State<Arc<DeliveryEngine>>,
    AuthUser(user): AuthUser,
    Path(message_id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    engine.delete(message_id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(json!({ "success": true }))))
}

/// GET /api/conversations/{id}/messages
pub async fn history(
    State(engine): State<Arc<DeliveryEngine>>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<HistoryResponse>>, ApiError> {
    let HistoryPage { messages, total } = engine
        .history(conversation_id, user.user_id, query.limit, query.offset)
        .await?;
    Ok(Json(ApiResponse::ok(HistoryResponse { messages, total })))
}

/// POST /api/conversations
///
/// The creator is always included and holds the admin role.
pub async fn create_conversation(
    State(engine): State<Arc<DeliveryEngine>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateConversationRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if request.member_ids.is_empty() {
        return Err(ApiError::validation(
            "A conversation needs at least one other member",
        ));
    }

    let mut members = vec![(user.user_id, MemberRole::Admin)];
    for member_id in request.member_ids {
        if member_id != user.user_id && !members.iter().any(|(id, _)| *id == member_id) {
            members.push((member_id, MemberRole::Member));
        }
    }

    let conversation = engine
        .store()
        .create_conversation(request.name, request.is_group, members)
        .await?;

    Ok(Json(ApiResponse::ok(json!({
        "id": conversation.id,
        "name": conversation.name,
        "is_group": conversation.is_group,
        "created_at": conversation.created_at,
    }))))
}

/// GET /api/conversations
pub async fn list_conversations(
    State(engine): State<Arc<DeliveryEngine>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Vec<Uuid>>>, ApiError> {
    let conversations = engine.store().conversations_for_user(user.user_id).await?;
    Ok(Json(ApiResponse::ok(conversations)))
}
