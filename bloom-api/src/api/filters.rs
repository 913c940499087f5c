//! Filter selection endpoints
//!
//! - `GET /api/filters/:filename/{suggestions,available,targets}`
//! - `POST /api/filters/:filename/{validate,save}`

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use bloom_common::api::ApiResponse;
use serde::{Deserialize, Serialize};

use crate::api::files::SheetQuery;
use crate::error::ApiResult;
use crate::models::{AvailableColumn, FilterSuggestion, ValidationResult};
use crate::services::file_reader;
use crate::services::filter_manager::{self, SavedFilters, TargetSuggestion};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSelection {
    #[serde(alias = "filters")]
    pub selected_filters: Vec<String>,
    #[serde(default)]
    pub sheet: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsResponse {
    pub file_name: String,
    pub total_columns: usize,
    pub suggestions: Vec<FilterSuggestion>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableResponse {
    pub file_name: String,
    pub columns: Vec<AvailableColumn>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetsResponse {
    pub file_name: String,
    pub targets: Vec<TargetSuggestion>,
}

/// GET /api/filters/:filename/suggestions
pub async fn get_suggestions(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    query: Result<Query<SheetQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<SuggestionsResponse>>> {
    let Query(query) = query?;
    let (_, grid) = file_reader::load_sheet(&state.config, &filename, query.sheet).await?;
    Ok(Json(ApiResponse::ok(SuggestionsResponse {
        file_name: filename,
        total_columns: grid.headers.len(),
        suggestions: filter_manager::suggest(&grid.headers),
    })))
}

/// GET /api/filters/:filename/available
pub async fn get_available(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    query: Result<Query<SheetQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<AvailableResponse>>> {
    let Query(query) = query?;
    let (_, grid) = file_reader::load_sheet(&state.config, &filename, query.sheet).await?;
    Ok(Json(ApiResponse::ok(AvailableResponse {
        file_name: filename,
        columns: filter_manager::available_columns(&grid),
    })))
}

/// GET /api/filters/:filename/targets
pub async fn get_targets(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    query: Result<Query<SheetQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<TargetsResponse>>> {
    let Query(query) = query?;
    let (_, grid) = file_reader::load_sheet(&state.config, &filename, query.sheet).await?;
    Ok(Json(ApiResponse::ok(TargetsResponse {
        file_name: filename,
        targets: filter_manager::suggest_targets(&grid.headers),
    })))
}

/// POST /api/filters/:filename/validate
///
/// Always 200; the verdict is in `isValid`.
pub async fn validate_filters(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    payload: Result<Json<FilterSelection>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<ValidationResult>>> {
    let Json(selection) = payload?;
    let (_, grid) = file_reader::load_sheet(&state.config, &filename, selection.sheet).await?;
    let result = filter_manager::validate(&selection.selected_filters, &grid.headers);
    Ok(Json(ApiResponse::ok(result)))
}

/// POST /api/filters/:filename/save
pub async fn save_filters(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    payload: Result<Json<FilterSelection>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<SavedFilters>>> {
    let Json(selection) = payload?;
    let saved = filter_manager::save_filters(
        &state.config,
        &state.filter_states,
        &state.metadata,
        &filename,
        selection.sheet,
        selection.selected_filters,
    )
    .await?;
    Ok(Json(ApiResponse::ok(saved).with_message("Filters saved")))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/filters/:filename/suggestions", get(get_suggestions))
        .route("/api/filters/:filename/available", get(get_available))
        .route("/api/filters/:filename/targets", get(get_targets))
        .route("/api/filters/:filename/validate", post(validate_filters))
        .route("/api/filters/:filename/save", post(save_filters))
}
