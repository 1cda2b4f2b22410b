//! Backend Error Module
//!
//! Error taxonomy for the session and delivery core, plus the conversion
//! into HTTP responses.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports
//! ├── types.rs      - Error type definitions and machine codes
//! └── conversion.rs - IntoResponse implementation
//! ```
//!
//! Every failure surfaced by the session manager or the delivery engine maps
//! to one variant with a stable machine-readable code; handlers return
//! `Result<_, ApiError>` and axum renders the JSON error envelope.

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

pub use types::{ApiError, StoreError};
