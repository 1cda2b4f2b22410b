/**
 * Message Routes
 *
 * Route table for conversations and messages, mirroring the delivery
 * engine operations one-to-one. Every route here requires a valid access
 * token.
 *
 * # Routes
 *
 * - `POST /api/conversations` - Create a conversation
 * - `GET /api/conversations` - List the caller's conversation ids
 * - `GET /api/conversations/{id}/messages` - History page
 * - `POST /api/messages` - Send a message
 * - `PUT /api/messages/{id}` - Edit (sender only)
 * - `DELETE /api/messages/{id}` - Soft delete (sender or admin)
 * - `PUT /api/messages/{id}/status` - Report delivered/read
 * - `POST /api/messages/{id}/reaction` - Attach or replace a reaction
 */
use axum::routing::{get, post, put};
use axum::Router;

use crate::backend::delivery::handlers::{
    add_reaction, create_conversation, delete_message, edit_message, history, list_conversations,
    send_message, update_status,
};
use crate::backend::server::state::AppState;

pub fn message_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/conversations",
            post(create_conversation).get(list_conversations),
        )
        .route("/api/conversations/{id}/messages", get(history))
        .route("/api/messages", post(send_message))
        .route(
            "/api/messages/{id}",
            put(edit_message).delete(delete_message),
        )
        .route("/api/messages/{id}/status", put(update_status))
        .route("/api/messages/{id}/reaction", post(add_reaction))
}
