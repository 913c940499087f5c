//! Error types for bloom-api
//!
//! Every error renders as the standard envelope
//! `{success: false, error, timestamp}` with a matching HTTP status.

use crate::services::python_client::PythonError;
use axum::{
    extract::multipart::MultipartError,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bloom_common::api::ApiResponse;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Conflict (409), e.g. analysis already exists
    #[error("{0}")]
    Conflict(String),

    /// Request body over the configured limit (413)
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    /// Route unavailable in this deployment (501)
    #[error("{0}")]
    NotImplemented(String),

    /// Python backend unreachable or failed (502)
    #[error("Python backend error: {0}")]
    Upstream(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// bloom-common error
    #[error(transparent)]
    Common(#[from] bloom_common::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        use bloom_common::Error as Common;

        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Common(err) => match err {
                Common::NotFound(_) => StatusCode::NOT_FOUND,
                Common::InvalidInput(_) => StatusCode::BAD_REQUEST,
                Common::Conflict(_) => StatusCode::CONFLICT,
                Common::Io(_) | Common::Json(_) | Common::Config(_) | Common::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Background task failed: {}", err))
    }
}

impl From<PythonError> for ApiError {
    fn from(err: PythonError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(format!("Invalid path: {}", rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(format!("Upload exceeds the size limit: {}", err.body_text()))
        } else {
            ApiError::BadRequest(format!("Invalid multipart upload: {}", err.body_text()))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Common(bloom_common::Error::NotFound(msg))
            | ApiError::Common(bloom_common::Error::InvalidInput(msg))
            | ApiError::Common(bloom_common::Error::Conflict(msg)) => msg.clone(),
            other => other.to_string(),
        };

        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            tracing::error!(status = %status, error = %message, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %message, "Request rejected");
        }

        (status, Json(ApiResponse::<()>::failure(message))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_error_status_mapping() {
        let err: ApiError = bloom_common::Error::NotFound("x".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let err: ApiError = bloom_common::Error::InvalidInput("x".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err: ApiError = bloom_common::Error::Conflict("x".into()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let err: ApiError = bloom_common::Error::Internal("x".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_direct_status_mapping() {
        assert_eq!(ApiError::NotImplemented("x".into()).status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(ApiError::Upstream("x".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ApiError::PayloadTooLarge("x".into()).status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_python_error_is_bad_gateway() {
        let err: ApiError = PythonError::Network("connection refused".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Python backend error: Network error: connection refused");
    }
}
