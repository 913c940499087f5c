//! Shared API request/response types
//!
//! Every endpoint answers with the same envelope:
//! `{success, data | error, timestamp}`.

use serde::{Deserialize, Serialize};

/// Response envelope
///
/// # Examples
///
/// ```
/// use bloom_common::api::types::ApiResponse;
///
/// let response = ApiResponse::ok(vec!["Region", "Channel"]);
/// assert!(response.success);
/// assert!(response.error.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Optional human-readable note on success (e.g. "Analysis created")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// RFC 3339 UTC
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            timestamp: crate::time::now_rfc3339(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
            timestamp: crate::time::now_rfc3339(),
        }
    }
}
