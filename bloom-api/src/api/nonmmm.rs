//! Non-MMM (descriptive analytics) endpoints
//!
//! Analyses share storage with brand analyses but are always of type
//! `non-mmm`; an MMM analysis ID is reported as not found here.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bloom_common::api::ApiResponse;
use bloom_common::naming::AnalysisType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::files::SheetQuery;
use crate::error::{ApiError, ApiResult};
use crate::models::{AnalysisRecord, CreateAnalysisRequest};
use crate::services::analytics::{self, ColumnSummary, Trendline};
use crate::services::brand_handler::DeletedAnalysis;
use crate::services::file_reader;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNonMmmRequest {
    pub brand_name: String,
    #[serde(default)]
    pub force_overwrite: bool,
}

#[derive(Debug, Deserialize)]
pub struct TrendlineQuery {
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub sheet: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub file_name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub numeric_columns: Vec<ColumnSummary>,
}

async fn non_mmm_record(state: &AppState, id: &str) -> ApiResult<AnalysisRecord> {
    let record = state.brands.get(id).await?;
    if record.analysis_type != AnalysisType::NonMmm {
        return Err(ApiError::NotFound(format!("Non-MMM analysis not found: {}", id)));
    }
    Ok(record)
}

/// POST /api/nonmmm/analyses
pub async fn create_analysis(
    State(state): State<AppState>,
    payload: Result<Json<CreateNonMmmRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AnalysisRecord>>)> {
    let Json(request) = payload?;
    let (record, _) = state
        .brands
        .create(CreateAnalysisRequest {
            brand_name: request.brand_name,
            analysis_type: AnalysisType::NonMmm,
            force_overwrite: request.force_overwrite,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(record).with_message("Non-MMM analysis created")),
    ))
}

/// GET /api/nonmmm/analyses
pub async fn list_analyses(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<AnalysisRecord>>>> {
    let records = state.brands.list(Some(AnalysisType::NonMmm)).await?;
    Ok(Json(ApiResponse::ok(records)))
}

/// GET /api/nonmmm/analyses/:id
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<AnalysisRecord>>> {
    Ok(Json(ApiResponse::ok(non_mmm_record(&state, &id).await?)))
}

/// DELETE /api/nonmmm/analyses/:id
///
/// Also drops the analysis' saved dashboard state.
pub async fn delete_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<DeletedAnalysis>>> {
    non_mmm_record(&state, &id).await?;
    let deleted = state.brands.delete(&id).await?;
    if let Err(e) = state.nonmmm_states.delete(&id).await {
        tracing::warn!(analysis_id = %id, error = %e, "Failed to remove non-MMM state");
    }
    Ok(Json(ApiResponse::ok(deleted).with_message("Non-MMM analysis deleted")))
}

/// POST /api/nonmmm/state/:analysisId
///
/// The analysis must exist and be non-MMM.
pub async fn save_state(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    let Json(body) = payload?;
    non_mmm_record(&state, &analysis_id).await?;
    let saved = state.nonmmm_states.save(&analysis_id, body).await?;
    Ok(Json(ApiResponse::ok(saved).with_message("State saved")))
}

/// GET /api/nonmmm/state/:analysisId
pub async fn get_state(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    Ok(Json(ApiResponse::ok(state.nonmmm_states.get(&analysis_id).await?)))
}

/// DELETE /api/nonmmm/state/:analysisId
pub async fn delete_state(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> ApiResult<Json<ApiResponse<String>>> {
    if !state.nonmmm_states.delete(&analysis_id).await? {
        return Err(ApiError::NotFound(format!(
            "No non-MMM state for {}",
            analysis_id
        )));
    }
    Ok(Json(ApiResponse::ok(analysis_id).with_message("State deleted")))
}

/// GET /api/nonmmm/:filename/summary
pub async fn get_summary(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    query: Result<Query<SheetQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<SummaryResponse>>> {
    let Query(query) = query?;
    let (_, grid) = file_reader::load_sheet(&state.config, &filename, query.sheet).await?;
    Ok(Json(ApiResponse::ok(SummaryResponse {
        file_name: filename,
        row_count: grid.rows.len(),
        column_count: grid.headers.len(),
        numeric_columns: analytics::column_summaries(&grid),
    })))
}

/// GET /api/nonmmm/:filename/trendline?x=&y=
pub async fn get_trendline(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    query: Result<Query<TrendlineQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Trendline>>> {
    let Query(query) = query?;
    let (_, grid) = file_reader::load_sheet(&state.config, &filename, query.sheet).await?;
    let line = analytics::trendline(&grid, &query.x, &query.y)?;
    Ok(Json(ApiResponse::ok(line)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/nonmmm/analyses",
            get(list_analyses).post(create_analysis),
        )
        .route(
            "/api/nonmmm/analyses/:id",
            get(get_analysis).delete(delete_analysis),
        )
        .route(
            "/api/nonmmm/state/:analysisId",
            get(get_state).post(save_state).delete(delete_state),
        )
        .route("/api/nonmmm/:filename/summary", get(get_summary))
        .route("/api/nonmmm/:filename/trendline", get(get_trendline))
}
