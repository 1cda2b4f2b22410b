//! Backend Module
//!
//! Server-side code for the veilchat session and real-time delivery core.
//!
//! # Architecture
//!
//! - **`server`** - Server initialization, application state, configuration
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`auth`** - Session manager: tokens, passwords, 2FA, auth endpoints
//! - **`gateway`** - WebSocket gateway: presence, typing, fan-out
//! - **`delivery`** - Message delivery engine and status state machine
//! - **`middleware`** - Access-token middleware
//! - **`error`** - Error taxonomy and response conversion
//!
//! # State Management
//!
//! `AppState` carries the three services (session manager, gateway,
//! delivery engine) as `Arc`s plus the optional database pool. The gateway
//! owns the only mutable in-memory table (the connection registry) behind
//! its own lock; everything else is request-scoped over the stores.

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Authentication and session management
pub mod auth;

/// Real-time connection gateway
pub mod gateway;

/// Message delivery engine
pub mod delivery;

/// Request middleware
pub mod middleware;

/// Backend error types
pub mod error;

// Re-export commonly used types
pub use error::ApiError;
pub use server::{create_app, AppState};
