//! Connection Gateway Module
//!
//! Gates every real-time connection on a valid access token, maintains
//! presence, relays typing indicators, and fans messages and status changes
//! out to connected participants.
//!
//! # Architecture
//!
//! - **`registry`** - The in-memory connection table (user → connections,
//!   room → connections) with its locking discipline
//! - **`socket`** - The WebSocket endpoint: handshake-time authorization,
//!   frame pumping, disconnect cleanup
//! - The `Gateway` type in this module wires the registry to the credential
//!   store (presence writes) and the delivery engine (message sends)
//!
//! # Failure isolation
//!
//! One participant's failure never affects the others: malformed frames are
//! answered (or logged) on that connection only, and fan-out skips dead
//! connections instead of failing the broadcast.

/// In-memory connection table
pub mod registry;

/// WebSocket endpoint
pub mod socket;

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::backend::auth::store::CredentialStore;
use crate::backend::delivery::engine::{DeliveryEngine, SendInput};
use crate::backend::error::ApiError;
use crate::shared::dto::{DeliveryState, MessageDto, Presence};
use crate::shared::events::{ClientEvent, ServerEvent};

pub use registry::{ConnectionId, ConnectionRegistry};

pub struct Gateway {
    registry: ConnectionRegistry,
    users: Arc<dyn CredentialStore>,
    delivery: Arc<DeliveryEngine>,
}

impl Gateway {
    pub fn new(users: Arc<dyn CredentialStore>, delivery: Arc<DeliveryEngine>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            users,
            delivery,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Other users who share at least one conversation with `user_id`.
    /// These are the targets of presence fan-out.
    async fn presence_audience(&self, user_id: Uuid) -> Result<HashSet<Uuid>, ApiError> {
        let store = self.delivery.store();
        let mut audience = HashSet::new();
        for conversation_id in store.conversations_for_user(user_id).await? {
            for participant in store.participants(conversation_id).await? {
                if participant.user_id != user_id {
                    audience.insert(participant.user_id);
                }
            }
        }
        Ok(audience)
    }

    async fn broadcast_presence(&self, user_id: Uuid, status: Presence) {
        match self.presence_audience(user_id).await {
            Ok(audience) => {
                self.registry
                    .broadcast_users(&audience, ServerEvent::PresenceChanged { user_id, status })
                    .await;
            }
            Err(e) => tracing::warn!("presence fan-out skipped for {}: {}", user_id, e),
        }
    }

    /// Register an authorized connection: join the user's conversation
    /// rooms, mark them online, and announce the change.
    pub async fn handle_connect(
        &self,
        user_id: Uuid,
    ) -> Result<(ConnectionId, UnboundedReceiver<ServerEvent>), ApiError> {
        let rooms = self.delivery.store().conversations_for_user(user_id).await?;
        let (conn, rx) = self.registry.register(user_id, &rooms).await;

        if let Err(e) = self
            .users
            .set_presence(user_id, Presence::Online, None)
            .await
        {
            tracing::warn!("presence write failed for {}: {}", user_id, e);
        }
        self.broadcast_presence(user_id, Presence::Online).await;

        tracing::info!("user {} connected ({} rooms)", user_id, rooms.len());
        Ok((conn, rx))
    }

    /// Tear down a connection. The user goes offline (with a last-seen
    /// timestamp) only when no other connection of theirs remains.
    pub async fn handle_disconnect(&self, conn: ConnectionId) {
        let Some((user_id, was_last)) = self.registry.unregister(conn).await else {
            return;
        };
        if !was_last {
            return;
        }

        if let Err(e) = self
            .users
            .set_presence(user_id, Presence::Offline, Some(Utc::now()))
            .await
        {
            tracing::warn!("presence write failed for {}: {}", user_id, e);
        }
        self.broadcast_presence(user_id, Presence::Offline).await;
        tracing::info!("user {} disconnected", user_id);
    }

    /// Dispatch one inbound event from a connection.
    pub async fn handle_event(
        &self,
        conn: ConnectionId,
        user_id: Uuid,
        username: &str,
        event: ClientEvent,
    ) {
        match event {
            ClientEvent::PresenceOnline => self.set_presence(user_id, Presence::Online).await,
            ClientEvent::PresenceOffline => self.set_presence(user_id, Presence::Offline).await,
            ClientEvent::PresenceAway => self.set_presence(user_id, Presence::Away).await,
            ClientEvent::PresenceBusy => self.set_presence(user_id, Presence::Busy).await,

            ClientEvent::TypingSet {
                conversation_id,
                is_typing,
            } => {
                // Relayed verbatim, never persisted. Only connections that
                // actually joined the room may emit into it.
                if !self.registry.in_room(conn, conversation_id).await {
                    tracing::warn!(
                        "typing relay dropped: {} not in room {}",
                        conn,
                        conversation_id
                    );
                    return;
                }
                self.registry
                    .broadcast_room(
                        conversation_id,
                        ServerEvent::TypingChanged {
                            user_id,
                            username: username.to_string(),
                            conversation_id,
                            is_typing,
                        },
                        Some(conn),
                    )
                    .await;
            }

            ClientEvent::MessageSend {
                conversation_id,
                content,
                message_type,
                reply_to,
                client_ref,
            } => {
                self.relay_send(
                    conn,
                    user_id,
                    conversation_id,
                    content,
                    message_type,
                    reply_to,
                    client_ref,
                )
                .await;
            }

            ClientEvent::MessageDelivered { message_id } => {
                self.relay_status(conn, user_id, message_id, DeliveryState::Delivered)
                    .await;
            }
            ClientEvent::MessageRead { message_id } => {
                self.relay_status(conn, user_id, message_id, DeliveryState::Read)
                    .await;
            }
        }
    }

    async fn set_presence(&self, user_id: Uuid, status: Presence) {
        let last_seen = matches!(status, Presence::Offline).then(Utc::now);
        if let Err(e) = self.users.set_presence(user_id, status, last_seen).await {
            tracing::warn!("presence write failed for {}: {}", user_id, e);
            return;
        }
        self.broadcast_presence(user_id, status).await;
    }

    /// Persist a message through the delivery engine, then acknowledge the
    /// sender and fan the message out to the room. Failures become a
    /// structured negative ack on the sending connection, never a silent
    /// drop.
    #[allow(clippy::too_many_arguments)]
    async fn relay_send(
        &self,
        conn: ConnectionId,
        user_id: Uuid,
        conversation_id: Uuid,
        content: String,
        message_type: String,
        reply_to: Option<Uuid>,
        client_ref: Option<String>,
    ) {
        let result = self
            .delivery
            .send(SendInput {
                conversation_id,
                sender_id: user_id,
                content,
                message_type,
                reply_to,
            })
            .await;

        match result {
            Ok(message) => {
                self.registry
                    .send_to_conn(
                        conn,
                        ServerEvent::MessageAck {
                            client_ref,
                            success: true,
                            message_id: Some(message.id),
                            error: None,
                        },
                    )
                    .await;
                self.registry
                    .broadcast_room(
                        conversation_id,
                        ServerEvent::MessageReceived { message },
                        Some(conn),
                    )
                    .await;
            }
            Err(e) => {
                tracing::warn!("send relay failed for user {}: {}", user_id, e);
                self.registry
                    .send_to_conn(
                        conn,
                        ServerEvent::MessageAck {
                            client_ref,
                            success: false,
                            message_id: None,
                            error: Some(e.to_string()),
                        },
                    )
                    .await;
            }
        }
    }

    /// Fan out a message persisted outside the socket path (the HTTP send
    /// endpoint). Every connected participant gets it, the sender's other
    /// devices included; there is no connection to ack.
    pub async fn notify_message(&self, message: MessageDto) {
        let conversation_id = message.conversation_id;
        self.registry
            .broadcast_room(
                conversation_id,
                ServerEvent::MessageReceived { message },
                None,
            )
            .await;
    }

    async fn relay_status(
        &self,
        conn: ConnectionId,
        user_id: Uuid,
        message_id: Uuid,
        target: DeliveryState,
    ) {
        let conversation_id = match self.delivery.store().find_message(message_id).await {
            Ok(Some(message)) => message.conversation_id,
            Ok(None) => {
                tracing::warn!("status report for unknown message {}", message_id);
                return;
            }
            Err(e) => {
                tracing::warn!("status lookup failed for {}: {}", message_id, e);
                return;
            }
        };

        match self.delivery.update_status(message_id, user_id, target).await {
            Ok(row) => {
                self.registry
                    .broadcast_room(
                        conversation_id,
                        ServerEvent::MessageStatusChanged {
                            message_id,
                            status: row.status,
                            by: user_id,
                        },
                        Some(conn),
                    )
                    .await;
            }
            Err(e) => tracing::warn!(
                "status update failed for message {} by {}: {}",
                message_id,
                user_id,
                e
            ),
        }
    }
}
