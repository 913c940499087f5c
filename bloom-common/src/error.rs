//! Library-level errors shared by the BrandBloom crates
//!
//! HTTP mapping lives in bloom-api; variants here only say what went wrong.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document or request body is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file unreadable or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Analysis, file, sheet, state or workbook does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Analysis already exists and overwrite was not requested
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
