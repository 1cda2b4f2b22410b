//! Shared Types
//!
//! Types used on both sides of the wire: DTOs returned by the HTTP API,
//! the response envelope, and the real-time event vocabulary spoken over
//! the gateway socket.
//!
//! Nothing in this module touches the database or the network; the client
//! reconciliation layer depends on it without pulling in any server code.

pub mod dto;
pub mod events;

pub use dto::{
    ApiResponse, DeliveryState, MessageDto, Presence, ReactionDto, StatusDto, UserDto,
};
pub use events::{ClientEvent, ServerEvent, TYPING_EXPIRY_SECS};
