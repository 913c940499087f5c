//! API module for shared HTTP API functionality
//!
//! Contains ONLY framework-independent types. The service crate wraps these
//! with axum extractors and responses.

pub mod types;

pub use types::ApiResponse;
