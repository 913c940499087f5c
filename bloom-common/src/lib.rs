//! # BrandBloom Common Library
//!
//! Shared code for the BrandBloom backend services including:
//! - Error and result types
//! - Configuration loading and root folder resolution
//! - API response envelope types
//! - Brand and file naming helpers
//! - File-backed JSON document storage
//! - Timestamp utilities

pub mod api;
pub mod config;
pub mod error;
pub mod json_store;
pub mod naming;
pub mod time;

pub use error::{Error, Result};
pub use json_store::JsonStore;
