//! Message Delivery Module
//!
//! Persistence and state machine for messages and their per-recipient
//! delivery status.
//!
//! # Architecture
//!
//! - **`engine`** - The delivery engine; validation, permissions, and the
//!   atomic send path
//! - **`store`** - `MessageStore` interface plus the in-memory store
//! - **`postgres`** - PostgreSQL `MessageStore` implementation
//! - **`handlers`** - HTTP handlers mirroring the engine operations
//!
//! # Delivery State Machine
//!
//! Every (message, recipient) pair owns exactly one status row moving
//! monotonically through `pending/sent → delivered → read`. The sender's
//! row starts at `sent`, everyone else's at `pending`. Regressive reports
//! are silent no-ops; `delivered_at` and `read_at` are recorded the first
//! time their threshold is crossed, with `read` backfilling `delivered_at`
//! when it arrives first. Reactions ride on the same row but never touch
//! the progression.

/// Delivery engine: send, status, reactions, edit, delete, history
pub mod engine;

/// Message storage interface and in-memory implementation
pub mod store;

/// PostgreSQL message store
pub mod postgres;

/// HTTP handlers for message endpoints
pub mod handlers;

// Re-export commonly used types
pub use engine::{DeliveryEngine, HistoryPage, SendInput};
pub use store::{MemberRole, MemoryMessageStore, MessageStore};
