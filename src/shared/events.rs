/**
 * Real-time Event Vocabulary
 *
 * This module defines the events exchanged over the gateway socket.
 * Events are JSON objects tagged by a `type` field, e.g.
 * `{"type":"typing.set","conversation_id":"...","is_typing":true}`.
 *
 * # Direction
 *
 * - `ClientEvent` - sent by clients to the server
 * - `ServerEvent` - fanned out by the server to connected clients
 *
 * Framing is plain WebSocket text frames; one JSON event per frame.
 */
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::dto::{DeliveryState, MessageDto, Presence};

/// Typing indicators auto-expire client-side after this many seconds of
/// silence unless renewed. The server relays them verbatim and never
/// persists or expires them itself.
pub const TYPING_EXPIRY_SECS: u64 = 3;

fn default_message_type() -> String {
    "text".to_string()
}

/// Inbound events from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "presence.online")]
    PresenceOnline,
    #[serde(rename = "presence.offline")]
    PresenceOffline,
    #[serde(rename = "presence.away")]
    PresenceAway,
    #[serde(rename = "presence.busy")]
    PresenceBusy,
    #[serde(rename = "typing.set")]
    TypingSet {
        conversation_id: Uuid,
        is_typing: bool,
    },
    #[serde(rename = "message.send")]
    MessageSend {
        conversation_id: Uuid,
        /// Opaque encrypted payload; the server never inspects it.
        content: String,
        #[serde(default = "default_message_type")]
        message_type: String,
        #[serde(default)]
        reply_to: Option<Uuid>,
        /// Client-local temporary identifier, echoed back in the ack so the
        /// sender can reconcile its optimistic entry.
        #[serde(default)]
        client_ref: Option<String>,
    },
    #[serde(rename = "message.delivered")]
    MessageDelivered { message_id: Uuid },
    #[serde(rename = "message.read")]
    MessageRead { message_id: Uuid },
}

/// Outbound events from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "presence.changed")]
    PresenceChanged { user_id: Uuid, status: Presence },
    #[serde(rename = "typing.changed")]
    TypingChanged {
        user_id: Uuid,
        username: String,
        conversation_id: Uuid,
        is_typing: bool,
    },
    #[serde(rename = "message.received")]
    MessageReceived { message: MessageDto },
    #[serde(rename = "message.status.changed")]
    MessageStatusChanged {
        message_id: Uuid,
        status: DeliveryState,
        by: Uuid,
    },
    /// Acknowledgment for a `message.send`. Either `message_id` (success) or
    /// `error` (structured failure) is set; the sender's `client_ref` is
    /// echoed back for reconciliation.
    #[serde(rename = "message.ack")]
    MessageAck {
        client_ref: Option<String>,
        success: bool,
        message_id: Option<Uuid>,
        error: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_tagging() {
        let event = ClientEvent::TypingSet {
            conversation_id: Uuid::new_v4(),
            is_typing: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "typing.set");
        assert_eq!(json["is_typing"], true);
    }

    #[test]
    fn test_message_send_defaults() {
        let conversation_id = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"message.send","conversation_id":"{}","content":"blob"}}"#,
            conversation_id
        );
        let event: ClientEvent = serde_json::from_str(&raw).unwrap();
        match event {
            ClientEvent::MessageSend {
                message_type,
                reply_to,
                client_ref,
                ..
            } => {
                assert_eq!(message_type, "text");
                assert!(reply_to.is_none());
                assert!(client_ref.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_server_event_round_trip() {
        let event = ServerEvent::MessageStatusChanged {
            message_id: Uuid::new_v4(),
            status: DeliveryState::Read,
            by: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("message.status.changed"));
        let parsed: ServerEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerEvent::MessageStatusChanged { status, .. } => {
                assert_eq!(status, DeliveryState::Read);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_presence_events_parse() {
        let event: ClientEvent = serde_json::from_str(r#"{"type":"presence.online"}"#).unwrap();
        assert!(matches!(event, ClientEvent::PresenceOnline));
        let event: ClientEvent = serde_json::from_str(r#"{"type":"presence.busy"}"#).unwrap();
        assert!(matches!(event, ClientEvent::PresenceBusy));
    }
}
