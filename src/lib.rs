//! Veilchat
//!
//! Session and real-time delivery core for an end-to-end encrypted chat
//! application: token-based session management with refresh rotation and
//! an optional TOTP second factor, a WebSocket connection gateway with
//! presence and typing relay, a message delivery engine with monotonic
//! per-recipient status progression, and the client-side reconciliation
//! helpers for optimistic sends.
//!
//! # Crate Layout
//!
//! - [`backend`] - The Axum server: auth, gateway, delivery, routes
//! - [`shared`] - DTOs and the real-time event vocabulary, shared between
//!   server and client
//! - [`client`] - Client-side reconciliation: optimistic timeline and the
//!   reconnect backoff policy

pub mod backend;
pub mod client;
pub mod shared;
