//! Client Reconciliation Module
//!
//! Client-side helpers for the real-time channel: the optimistic message
//! timeline (temporary-id to real-id reconciliation, duplicate suppression
//! on replay) and the bounded reconnect backoff policy.

/// Optimistic message timeline
pub mod timeline;

/// Reconnect backoff policy
pub mod reconnect;

pub use reconnect::{ReconnectPolicy, ReconnectState, ReconnectStep};
pub use timeline::{Timeline, TimelineEntry};
