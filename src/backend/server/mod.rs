//! Server Module
//!
//! Initialization and configuration of the Axum HTTP server.
//!
//! # Architecture
//!
//! - **`state`** - `AppState` and its `FromRef` implementations
//! - **`config`** - Environment configuration and database loading
//! - **`init`** - Application assembly (stores, services, router)
//!
//! # Initialization Flow
//!
//! 1. Load `ServerConfig` from the environment
//! 2. Connect to PostgreSQL and run migrations, or fall back to the
//!    in-memory stores when `DATABASE_URL` is absent
//! 3. Wire the session manager, delivery engine, and gateway
//! 4. Build the router

/// AppState and FromRef implementations
pub mod state;

/// Configuration loading
pub mod config;

/// Server initialization and app creation
pub mod init;

pub use config::ServerConfig;
pub use init::{create_app, create_app_with_stores};
pub use state::AppState;
