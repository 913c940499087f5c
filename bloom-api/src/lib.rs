//! bloom-api library - BrandBloom Insights backend
//!
//! Persists analysis workflow state, stores uploaded spreadsheets, keeps a
//! metadata workbook per upload and forwards heavy processing to the Python
//! backend.

use axum::{middleware, routing::get, Router};
use bloom_common::config::ServerConfig;
use bloom_common::JsonStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod error;
pub mod models;
pub mod services;

pub use error::{ApiError, ApiResult};

use services::{BrandHandler, ConcatenationStates, MetadataManager, NonMmmStates, PythonClient};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub brands: BrandHandler,
    pub metadata: MetadataManager,
    pub concatenation_states: ConcatenationStates,
    pub nonmmm_states: NonMmmStates,
    /// Saved filter selections, keyed by file stem
    pub filter_states: JsonStore,
    pub python: PythonClient,
    /// Server startup time, for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> ApiResult<Self> {
        let config = Arc::new(config);
        let python = PythonClient::new(
            &config.python_base_url,
            bloom_common::time::secs_to_duration(config.python_timeout_secs),
        )?;
        let metadata = MetadataManager::new(config.clone());

        Ok(Self {
            brands: BrandHandler::new(config.clone(), metadata.clone()),
            metadata,
            concatenation_states: ConcatenationStates::new(JsonStore::new(
                config.concatenation_states_dir(),
            )),
            nonmmm_states: NonMmmStates::new(JsonStore::new(config.nonmmm_states_dir())),
            filter_states: JsonStore::new(config.filter_states_dir()),
            python,
            startup_time: Utc::now(),
            config,
        })
    }
}

/// Build application router
///
/// Health and build info are always served. Everything that touches the
/// data root sits behind the serverless guard.
pub fn build_router(state: AppState) -> Router {
    let data_routes = Router::new()
        .merge(api::brands::routes())
        .merge(api::files::routes(state.config.max_upload_bytes))
        .merge(api::filters::routes())
        .merge(api::metadata::routes())
        .merge(api::nonmmm::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::serverless_guard,
        ));

    Router::new()
        .merge(api::health_routes())
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(data_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
