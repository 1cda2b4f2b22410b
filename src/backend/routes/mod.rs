//! Route Configuration Module
//!
//! HTTP route assembly for the backend server.
//!
//! # Architecture
//!
//! - **`router`** - Main router creation and middleware wiring
//! - **`auth_routes`** - /api/auth route tables (public and protected)
//! - **`message_routes`** - Conversation and message route table
//!
//! # Route Overview
//!
//! - `GET /health` - Liveness probe
//! - `GET /ws` - WebSocket endpoint (token in query string)
//! - `POST /api/auth/*` - Registration, login, refresh, logout
//! - `GET /api/auth/me` - Current user (protected)
//! - `/api/conversations`, `/api/messages/*` - Delivery engine surface
//!   (protected)

/// Main router creation
pub mod router;

/// Authentication route tables
pub mod auth_routes;

/// Conversation and message route table
pub mod message_routes;

pub use router::create_router;
