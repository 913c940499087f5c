//! File endpoints
//!
//! - `POST /api/files/upload` (multipart, field `file`)
//! - `POST /api/files/concatenate` (forwarded to the Python backend)
//! - `GET /api/files/:filename/{columns,sample,info,sheets}`

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use bloom_common::api::ApiResponse;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ApiError, ApiResult};
use crate::models::{ConcatenationState, FileInfo, SheetInfo, UploadedFile};
use crate::services::python_client::{self, ConcatenateRequest};
use crate::services::{file_reader, file_upload};
use crate::AppState;

pub const DEFAULT_SAMPLE_ROWS: usize = 5;
pub const MAX_SAMPLE_ROWS: usize = 100;

/// Allowance for multipart boundaries and part headers on top of the file limit
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Backend response keys copied into the saved concatenation state
const STATE_KEYS_FROM_BACKEND: &[&str] = &["columnCategories", "previewData", "totalRows"];

#[derive(Debug, Deserialize)]
pub struct SheetQuery {
    #[serde(default)]
    pub sheet: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SampleQuery {
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub rows: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnsResponse {
    pub file_name: String,
    pub sheet_name: Option<String>,
    pub columns: Vec<String>,
    pub column_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleResponse {
    pub file_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub total_rows: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetsResponse {
    pub file_name: String,
    pub sheets: Vec<SheetInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcatenateResponse {
    /// Backend answer, verbatim
    pub result: Value,
    pub state: ConcatenationState,
}

/// Clamp a requested sample size to `1..=MAX_SAMPLE_ROWS`
pub fn sample_rows(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_SAMPLE_ROWS)
        .clamp(1, MAX_SAMPLE_ROWS)
}

/// POST /api/files/upload
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ApiResponse<UploadedFile>>> {
    while let Some(field) = multipart.next_field().await? {
        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;

        if bytes.len() as u64 > state.config.max_upload_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "File too large: {} bytes (limit {} bytes)",
                bytes.len(),
                state.config.max_upload_bytes
            )));
        }

        let uploaded = file_upload::store_upload(&state.config, &original_name, &bytes).await?;
        return Ok(Json(
            ApiResponse::ok(uploaded).with_message("File uploaded successfully"),
        ));
    }

    Err(ApiError::BadRequest("No file uploaded".to_string()))
}

/// POST /api/files/concatenate
///
/// On success the concatenation state for the source file is replaced.
pub async fn concatenate_files(
    State(state): State<AppState>,
    payload: Result<Json<ConcatenateRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<ConcatenateResponse>>> {
    let Json(request) = payload?;
    if request.selected_sheets.is_empty() {
        return Err(ApiError::BadRequest("At least one sheet must be selected".to_string()));
    }
    file_reader::locate(&state.config, &request.file_name)?;

    let result = state.python.concatenate(&request).await?;

    let mut document = json!({
        "selectedSheets": request.selected_sheets,
        "status": "completed",
        "processedAt": bloom_common::time::now_rfc3339(),
    });
    if let Some(name) = python_client::concatenated_file_name(&result) {
        document["concatenatedFileName"] = json!(name);
    }
    let payload = result.get("data").unwrap_or(&result);
    for key in STATE_KEYS_FROM_BACKEND {
        if let Some(value) = payload.get(*key) {
            document[*key] = value.clone();
        }
    }

    // An unexpected backend shape should not lose the concatenation itself
    let saved = match state
        .concatenation_states
        .save(&request.file_name, document.clone())
        .await
    {
        Ok(saved) => saved,
        Err(bloom_common::Error::InvalidInput(reason)) => {
            tracing::warn!(file = %request.file_name, reason = %reason, "Backend fields rejected; saving minimal state");
            for key in STATE_KEYS_FROM_BACKEND {
                if let Some(map) = document.as_object_mut() {
                    map.remove(*key);
                }
            }
            state.concatenation_states.save(&request.file_name, document).await?
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(
        ApiResponse::ok(ConcatenateResponse {
            result,
            state: saved,
        })
        .with_message("Sheets concatenated"),
    ))
}

/// GET /api/files/:filename/columns
pub async fn get_columns(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    query: Result<Query<SheetQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<ColumnsResponse>>> {
    let Query(query) = query?;
    let (_, grid) = file_reader::load_sheet(&state.config, &filename, query.sheet.clone()).await?;
    Ok(Json(ApiResponse::ok(ColumnsResponse {
        file_name: filename,
        sheet_name: query.sheet,
        column_count: grid.headers.len(),
        columns: grid.headers,
    })))
}

/// GET /api/files/:filename/sample
pub async fn get_sample(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    query: Result<Query<SampleQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<SampleResponse>>> {
    let Query(query) = query?;
    let limit = sample_rows(query.rows);
    let (_, grid) = file_reader::load_sheet(&state.config, &filename, query.sheet).await?;
    Ok(Json(ApiResponse::ok(SampleResponse {
        file_name: filename,
        rows: grid.row_objects(limit),
        total_rows: grid.rows.len(),
        columns: grid.headers,
    })))
}

/// GET /api/files/:filename/info
pub async fn get_info(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<ApiResponse<FileInfo>>> {
    let info = file_reader::with_file(&state.config, &filename, file_reader::file_info).await?;
    Ok(Json(ApiResponse::ok(info)))
}

/// GET /api/files/:filename/sheets
pub async fn get_sheets(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<ApiResponse<SheetsResponse>>> {
    let sheets = file_reader::with_file(&state.config, &filename, |file| {
        let sheets = file_reader::read_all_sheets(file)?;
        Ok(sheets
            .iter()
            .map(|(name, grid)| file_reader::sheet_info(name, grid))
            .collect::<Vec<_>>())
    })
    .await?;
    Ok(Json(ApiResponse::ok(SheetsResponse {
        file_name: filename,
        sheets,
    })))
}

pub fn routes(max_upload_bytes: u64) -> Router<AppState> {
    let body_limit = (max_upload_bytes + MULTIPART_OVERHEAD_BYTES) as usize;

    Router::new()
        .route(
            "/api/files/upload",
            post(upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/files/concatenate", post(concatenate_files))
        .route("/api/files/:filename/columns", get(get_columns))
        .route("/api/files/:filename/sample", get(get_sample))
        .route("/api/files/:filename/info", get(get_info))
        .route("/api/files/:filename/sheets", get(get_sheets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rows_bounds() {
        assert_eq!(sample_rows(None), 5);
        assert_eq!(sample_rows(Some(0)), 1);
        assert_eq!(sample_rows(Some(20)), 20);
        assert_eq!(sample_rows(Some(5000)), 100);
    }
}
