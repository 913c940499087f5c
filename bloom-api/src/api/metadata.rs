//! Metadata workbook and concatenation state endpoints
//!
//! Workbooks: `POST /api/metadata/create`, `GET /api/metadata/file/:metadataFile`,
//! `POST .../log`, `PUT .../filters`, `PUT .../brand`.
//! States: `GET /api/metadata/states`,
//! `POST|GET|PUT|DELETE /api/metadata/state/:originalFileName`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use bloom_common::api::ApiResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiResult;
use crate::models::{BrandInfo, ConcatenationState, MetadataWorkbook};
use crate::services::metadata_manager::{CreateMetadataRequest, LogRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedMetadata {
    pub metadata_file: String,
    pub metadata: MetadataWorkbook,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterColumnsRequest {
    #[serde(alias = "selectedFilters")]
    pub filter_columns: Vec<String>,
}

/// POST /api/metadata/create
pub async fn create_metadata(
    State(state): State<AppState>,
    payload: Result<Json<CreateMetadataRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<CreatedMetadata>>)> {
    let Json(request) = payload?;
    let (metadata_file, metadata) = state.metadata.create(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::ok(CreatedMetadata {
                metadata_file,
                metadata,
            })
            .with_message("Metadata file created"),
        ),
    ))
}

/// GET /api/metadata/file/:metadataFile
pub async fn read_metadata(
    State(state): State<AppState>,
    Path(metadata_file): Path<String>,
) -> ApiResult<Json<ApiResponse<MetadataWorkbook>>> {
    Ok(Json(ApiResponse::ok(state.metadata.read(&metadata_file).await?)))
}

/// POST /api/metadata/file/:metadataFile/log
pub async fn append_log(
    State(state): State<AppState>,
    Path(metadata_file): Path<String>,
    payload: Result<Json<LogRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<MetadataWorkbook>>> {
    let Json(request) = payload?;
    let workbook = state.metadata.append_log(&metadata_file, request).await?;
    Ok(Json(ApiResponse::ok(workbook)))
}

/// PUT /api/metadata/file/:metadataFile/filters
pub async fn set_filters(
    State(state): State<AppState>,
    Path(metadata_file): Path<String>,
    payload: Result<Json<FilterColumnsRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<MetadataWorkbook>>> {
    let Json(request) = payload?;
    let workbook = state
        .metadata
        .set_filters(&metadata_file, request.filter_columns)
        .await?;
    Ok(Json(ApiResponse::ok(workbook)))
}

/// PUT /api/metadata/file/:metadataFile/brand
pub async fn set_brand_info(
    State(state): State<AppState>,
    Path(metadata_file): Path<String>,
    payload: Result<Json<BrandInfo>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<MetadataWorkbook>>> {
    let Json(info) = payload?;
    let workbook = state.metadata.set_brand_info(&metadata_file, info).await?;
    Ok(Json(ApiResponse::ok(workbook)))
}

/// GET /api/metadata/states
pub async fn list_states(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<ConcatenationState>>>> {
    Ok(Json(ApiResponse::ok(state.concatenation_states.list().await?)))
}

/// POST /api/metadata/state/:originalFileName
pub async fn save_state(
    State(state): State<AppState>,
    Path(original_file_name): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<ConcatenationState>>> {
    let Json(body) = payload?;
    let saved = state
        .concatenation_states
        .save(&original_file_name, body)
        .await?;
    Ok(Json(ApiResponse::ok(saved).with_message("Concatenation state saved")))
}

/// GET /api/metadata/state/:originalFileName
pub async fn get_state(
    State(state): State<AppState>,
    Path(original_file_name): Path<String>,
) -> ApiResult<Json<ApiResponse<ConcatenationState>>> {
    Ok(Json(ApiResponse::ok(
        state.concatenation_states.get(&original_file_name).await?,
    )))
}

/// PUT /api/metadata/state/:originalFileName
pub async fn update_state(
    State(state): State<AppState>,
    Path(original_file_name): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<ConcatenationState>>> {
    let Json(patch) = payload?;
    let updated = state
        .concatenation_states
        .update(&original_file_name, patch)
        .await?;
    Ok(Json(ApiResponse::ok(updated).with_message("Concatenation state updated")))
}

/// DELETE /api/metadata/state/:originalFileName
pub async fn delete_state(
    State(state): State<AppState>,
    Path(original_file_name): Path<String>,
) -> ApiResult<Json<ApiResponse<String>>> {
    state.concatenation_states.delete(&original_file_name).await?;
    Ok(Json(
        ApiResponse::ok(original_file_name).with_message("Concatenation state deleted"),
    ))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/metadata/create", post(create_metadata))
        .route("/api/metadata/file/:metadataFile", get(read_metadata))
        .route("/api/metadata/file/:metadataFile/log", post(append_log))
        .route("/api/metadata/file/:metadataFile/filters", put(set_filters))
        .route("/api/metadata/file/:metadataFile/brand", put(set_brand_info))
        .route("/api/metadata/states", get(list_states))
        .route(
            "/api/metadata/state/:originalFileName",
            post(save_state).get(get_state).put(update_state).delete(delete_state),
        )
}
