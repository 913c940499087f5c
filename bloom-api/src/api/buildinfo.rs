//! GET /api/buildinfo

use axum::{extract::State, Json};
use bloom_common::api::ApiResponse;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub build_profile: &'static str,
    /// Disk-backed routes are disabled
    pub serverless: bool,
    pub python_backend: String,
}

pub async fn get_build_info(State(state): State<AppState>) -> Json<ApiResponse<BuildInfo>> {
    Json(ApiResponse::ok(BuildInfo {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        git_hash: env!("GIT_HASH"),
        build_timestamp: env!("BUILD_TIMESTAMP"),
        build_profile: env!("BUILD_PROFILE"),
        serverless: state.config.serverless,
        python_backend: state.python.base_url().to_string(),
    }))
}
