//! Client for the Python statistical backend
//!
//! Concatenation, column categorization and modelling run in a separate
//! FastAPI service. This client only forwards requests and surfaces failures;
//! any failure to reach the backend becomes a 502 at the API layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("bloom-api/", env!("CARGO_PKG_VERSION"));

/// Python backend errors
#[derive(Debug, Error)]
pub enum PythonError {
    /// Backend unreachable, timed out or connection dropped
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a non-success status
    #[error("Backend returned {0}: {1}")]
    Status(u16, String),

    /// Response body was not the expected JSON
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Body forwarded to `/api/concatenate-sheets`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcatenateRequest {
    pub file_name: String,
    pub selected_sheets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_file_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PythonClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl PythonClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PythonError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PythonError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `/health` on the backend
    pub async fn health(&self) -> Result<Value, PythonError> {
        let url = format!("{}/health", self.base_url);
        tracing::debug!(url = %url, "Checking Python backend health");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| PythonError::Network(e.to_string()))?;
        Self::json_body(response).await
    }

    /// Ask the backend to concatenate sheets; returns its JSON answer verbatim
    pub async fn concatenate(&self, request: &ConcatenateRequest) -> Result<Value, PythonError> {
        let url = format!("{}/api/concatenate-sheets", self.base_url);
        tracing::debug!(
            url = %url,
            file = %request.file_name,
            sheets = request.selected_sheets.len(),
            "Forwarding concatenation request"
        );

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| PythonError::Network(e.to_string()))?;
        Self::json_body(response).await
    }

    async fn json_body(response: reqwest::Response) -> Result<Value, PythonError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PythonError::Status(status.as_u16(), error_text));
        }
        response
            .json()
            .await
            .map_err(|e| PythonError::Parse(e.to_string()))
    }
}

/// Pull the concatenated file name out of a backend answer.
///
/// The backend nests its payload under `data` on some versions and uses
/// snake_case keys on others.
pub fn concatenated_file_name(response: &Value) -> Option<String> {
    let payload = response.get("data").unwrap_or(response);
    ["concatenatedFileName", "concatenated_file_name", "fileName", "file_name"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
