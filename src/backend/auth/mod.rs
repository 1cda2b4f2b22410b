//! Authentication Module
//!
//! Session lifecycle for the chat backend: registration, login (with an
//! optional TOTP second factor), refresh-token rotation, and logout.
//!
//! # Architecture
//!
//! The auth module is organized into focused submodules:
//!
//! - **`manager`** - The session manager; orchestrates every auth operation
//! - **`store`** - `CredentialStore` interface plus the in-memory store
//! - **`postgres`** - PostgreSQL `CredentialStore` implementation
//! - **`tokens`** - JWT access/refresh token minting and verification
//! - **`password`** - bcrypt hashing and password-strength rules
//! - **`twofactor`** - TOTP codes and at-rest seed encryption
//! - **`handlers`** - HTTP handlers for the /api/auth endpoints
//!
//! # Token Model
//!
//! Two token kinds, distinguished by a `typ` claim:
//!
//! 1. **Access tokens** are short-lived and never persisted; they gate every
//!    authenticated request and the WebSocket handshake.
//! 2. **Refresh tokens** are long-lived, stored server-side only as a
//!    SHA-256 hash, and single-use: each refresh rotates the session, and
//!    concurrent refreshes of one token have exactly one winner.
//!
//! # Security
//!
//! - Passwords are bcrypt-hashed; strength rules are checked up front and
//!   every unmet rule is reported together
//! - Unknown identifier and wrong password are indistinguishable to callers
//! - TOTP seeds are AES-256-GCM encrypted at rest and shown exactly once
//! - Login attempts are rate limited per identifier

/// Session manager orchestrating all auth operations
pub mod manager;

/// Credential storage interface and in-memory implementation
pub mod store;

/// PostgreSQL credential store
pub mod postgres;

/// JWT access/refresh token handling
pub mod tokens;

/// Password hashing and strength validation
pub mod password;

/// TOTP second factor and seed encryption
pub mod twofactor;

/// HTTP handlers for authentication endpoints
pub mod handlers;

// Re-export commonly used types and handlers
pub use manager::{AuthSuccess, ClientMeta, LoginInput, RegisterInput, SessionManager, TokenPair};
pub use store::{CredentialStore, MemoryCredentialStore};
