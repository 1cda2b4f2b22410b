//! Middleware Module
//!
//! Request-processing middleware shared by the protected routes.

/// Access-token verification middleware and the `AuthUser` extractor
pub mod auth;

pub use auth::{auth_middleware, AuthUser};
