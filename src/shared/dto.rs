/**
 * Data Transfer Objects
 *
 * This module defines the sanitized shapes the API returns to clients.
 * None of these carry a password hash or a second-factor seed; the
 * conversion from storage records strips sensitive fields exactly once,
 * at the boundary.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Presence status for a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Offline,
    Away,
    Busy,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Online => "online",
            Presence::Offline => "offline",
            Presence::Away => "away",
            Presence::Busy => "busy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Presence::Online),
            "offline" => Some(Presence::Offline),
            "away" => Some(Presence::Away),
            "busy" => Some(Presence::Busy),
            _ => None,
        }
    }
}

/// Per-recipient delivery state of a message.
///
/// `Pending` and `Sent` share the lowest rung of the ordering: `Sent` is the
/// sender's own row, `Pending` is everyone else's starting point. A row only
/// ever moves up the ordering, never down.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Sent,
    Delivered,
    Read,
}

impl DeliveryState {
    /// Position in the monotonic ordering. Transitions are applied only when
    /// the target ordinal strictly exceeds the current one.
    pub fn ordinal(&self) -> u8 {
        match self {
            DeliveryState::Pending | DeliveryState::Sent => 0,
            DeliveryState::Delivered => 1,
            DeliveryState::Read => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Pending => "pending",
            DeliveryState::Sent => "sent",
            DeliveryState::Delivered => "delivered",
            DeliveryState::Read => "read",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeliveryState::Pending),
            "sent" => Some(DeliveryState::Sent),
            "delivered" => Some(DeliveryState::Delivered),
            "read" => Some(DeliveryState::Read),
            _ => None,
        }
    }
}

/// User information that is safe to return to clients.
///
/// Does not include the password hash or the encrypted second-factor seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub totp_enabled: bool,
    pub presence: Presence,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A message as seen by clients. Content is an opaque blob the server
/// never inspects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
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

/// Delivery status row for one (message, recipient) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDto {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub status: DeliveryState,
    pub reaction: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Reaction marker for one (message, user) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionDto {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
}

/// Success envelope for API responses.
///
/// Every endpoint answers `{"status": "ok", "data": ...}` on success; the
/// error side of the envelope is produced by the backend error conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: "ok".to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_state_ordering() {
        assert_eq!(DeliveryState::Pending.ordinal(), 0);
        assert_eq!(DeliveryState::Sent.ordinal(), 0);
        assert_eq!(DeliveryState::Delivered.ordinal(), 1);
        assert_eq!(DeliveryState::Read.ordinal(), 2);
    }

    #[test]
    fn test_delivery_state_round_trip() {
        for state in [
            DeliveryState::Pending,
            DeliveryState::Sent,
            DeliveryState::Delivered,
            DeliveryState::Read,
        ] {
            assert_eq!(DeliveryState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(DeliveryState::from_str("bogus"), None);
    }

    #[test]
    fn test_presence_round_trip() {
        for presence in [
            Presence::Online,
            Presence::Offline,
            Presence::Away,
            Presence::Busy,
        ] {
            assert_eq!(Presence::from_str(presence.as_str()), Some(presence));
        }
    }

    #[test]
    fn test_delivery_state_serde_lowercase() {
        let json = serde_json::to_string(&DeliveryState::Delivered).unwrap();
        assert_eq!(json, "\"delivered\"");
    }

    #[test]
    fn test_api_response_envelope() {
        let envelope = ApiResponse::ok(42);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["data"], 42);
    }
}
