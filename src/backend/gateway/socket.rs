/**
 * WebSocket Endpoint
 *
 * GET /ws?token=<access token> — the real-time connection.
 *
 * Authorization happens at handshake time, before the upgrade: an invalid
 * or expired token is refused with 401 and no event exchange ever occurs.
 * Tokens travel in the query string because browser WebSocket clients
 * cannot set an Authorization header on the upgrade request.
 *
 * After the upgrade, one writer task pumps the connection's event channel
 * into the socket while this task reads inbound frames. A malformed frame
 * is logged and skipped; it never tears down the connection or affects
 * other participants.
 */
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::auth::manager::SessionManager;
use crate::backend::auth::tokens::{user_id_from_access, verify_access_token};
use crate::backend::error::ApiError;
use crate::backend::gateway::Gateway;
use crate::shared::events::ClientEvent;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

pub async fn ws_handler(
    State(sessions): State<Arc<SessionManager>>,
    State(gateway): State<Arc<Gateway>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    // Verify exactly as an authenticated HTTP request would, pre-upgrade.
    let claims = match verify_access_token(sessions.jwt_secret(), &query.token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!("ws handshake refused: {}", e);
            return ApiError::Unauthorized.into_response();
        }
    };
    let user_id = match user_id_from_access(&claims) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("ws handshake refused: {}", e);
            return ApiError::Unauthorized.into_response();
        }
    };
    match sessions.store().find_user_by_id(user_id).await {
        Ok(Some(user)) if user.is_active => {}
        Ok(_) => return ApiError::Unauthorized.into_response(),
        Err(e) => return ApiError::from(e).into_response(),
    }

    let username = claims.username;
    ws.on_upgrade(move |socket| handle_socket(gateway, socket, user_id, username))
}

async fn handle_socket(gateway: Arc<Gateway>, socket: WebSocket, user_id: Uuid, username: String) {
    let (conn, mut events) = match gateway.handle_connect(user_id).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!("connection setup failed for {}: {}", user_id, e);
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    // Writer: drain the registry channel into the socket until either side
    // goes away.
    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("event serialization failed: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Reader: dispatch inbound frames until close.
    while let Some(Ok(frame)) = stream.next().await {
        match frame {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => gateway.handle_event(conn, user_id, &username, event).await,
                Err(e) => {
                    tracing::warn!("malformed frame from {}: {}", conn, e);
                }
            },
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames are not part of the
            // event vocabulary.
            _ => {}
        }
    }

    gateway.handle_disconnect(conn).await;
    writer.abort();
}
