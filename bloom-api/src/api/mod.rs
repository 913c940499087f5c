//! HTTP API handlers for bloom-api

pub mod brands;
pub mod buildinfo;
pub mod files;
pub mod filters;
pub mod health;
pub mod metadata;
pub mod nonmmm;

pub use buildinfo::get_build_info;
pub use health::health_routes;

use crate::{ApiError, AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Reject disk-backed routes with 501 when running serverless
pub async fn serverless_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.config.serverless {
        return Err(ApiError::NotImplemented(format!(
            "{} is not available in serverless mode",
            request.uri().path()
        )));
    }
    Ok(next.run(request).await)
}
