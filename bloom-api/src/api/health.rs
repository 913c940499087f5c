//! Health check endpoints
//!
//! `/health` is a liveness check. `/api/health` also asks the Python backend,
//! reporting `degraded` instead of failing when it cannot be reached.

use axum::{extract::State, routing::get, Json, Router};
use bloom_common::api::ApiResponse;
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub serverless: bool,
    /// Python backend reachability; only reported by `/api/health`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_backend: Option<PythonBackendStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PythonBackendStatus {
    pub url: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn base_health(state: &AppState) -> HealthResponse {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    HealthResponse {
        status: "ok".to_string(),
        service: "bloom-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        serverless: state.config.serverless,
        python_backend: None,
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(base_health(&state)))
}

/// GET /api/health
pub async fn api_health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let mut health = base_health(&state);

    let backend = match state.python.health().await {
        Ok(_) => PythonBackendStatus {
            url: state.python.base_url().to_string(),
            reachable: true,
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Python backend health check failed");
            health.status = "degraded".to_string();
            PythonBackendStatus {
                url: state.python.base_url().to_string(),
                reachable: false,
                error: Some(e.to_string()),
            }
        }
    };
    health.python_backend = Some(backend);

    Json(ApiResponse::ok(health))
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
}
