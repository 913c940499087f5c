//! Brand analysis endpoints
//!
//! - `POST /api/brands/analyses`, `GET /api/brands/analyses`
//! - `GET|PUT|DELETE /api/brands/analyses/:id`
//! - `GET /api/brands/:brandName/exists`
//! - `POST /api/brands/categorize`

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bloom_common::api::ApiResponse;
use bloom_common::naming::AnalysisType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::models::{AnalysisRecord, BrandInfo, CreateAnalysisRequest};
use crate::services::brand_categorizer::{self, BrandCategorization, CategorizeRequest};
use crate::services::brand_handler::{BrandExists, DeletedAnalysis};
use crate::services::file_reader;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub analysis_type: Option<AnalysisType>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeResponse {
    #[serde(flatten)]
    pub categorization: BrandCategorization,
    /// Metadata workbook whose BrandInfo sheet was updated
    pub metadata_file: Option<String>,
}

/// POST /api/brands/analyses
pub async fn create_analysis(
    State(state): State<AppState>,
    payload: Result<Json<CreateAnalysisRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AnalysisRecord>>)> {
    let Json(request) = payload?;
    let (record, replaced) = state.brands.create(request).await?;
    let message = if replaced {
        "Analysis overwritten"
    } else {
        "Analysis created"
    };
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(record).with_message(message)),
    ))
}

/// GET /api/brands/analyses
pub async fn list_analyses(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Vec<AnalysisRecord>>>> {
    let Query(query) = query?;
    let records = state.brands.list(query.analysis_type).await?;
    Ok(Json(ApiResponse::ok(records)))
}

/// GET /api/brands/analyses/:id
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<AnalysisRecord>>> {
    Ok(Json(ApiResponse::ok(state.brands.get(&id).await?)))
}

/// PUT /api/brands/analyses/:id
pub async fn update_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<AnalysisRecord>>> {
    let Json(patch) = payload?;
    let record = state.brands.update(&id, patch).await?;
    Ok(Json(ApiResponse::ok(record).with_message("Analysis updated")))
}

/// DELETE /api/brands/analyses/:id
pub async fn delete_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<DeletedAnalysis>>> {
    let deleted = state.brands.delete(&id).await?;
    Ok(Json(ApiResponse::ok(deleted).with_message("Analysis deleted")))
}

/// GET /api/brands/:brandName/exists
pub async fn brand_exists(
    State(state): State<AppState>,
    Path(brand_name): Path<String>,
) -> ApiResult<Json<ApiResponse<BrandExists>>> {
    Ok(Json(ApiResponse::ok(state.brands.exists(&brand_name).await?)))
}

/// POST /api/brands/categorize
///
/// Columns come from the request or from the first (or named) sheet of
/// `fileName`. When the file has a metadata workbook its BrandInfo sheet is
/// rewritten with the result.
pub async fn categorize_brands(
    State(state): State<AppState>,
    payload: Result<Json<CategorizeRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<CategorizeResponse>>> {
    let Json(request) = payload?;
    if request.client_brand.trim().is_empty() {
        return Err(ApiError::BadRequest("clientBrand is required".to_string()));
    }

    let columns = match (&request.columns, &request.file_name) {
        (Some(columns), _) => columns.clone(),
        (None, Some(file_name)) => {
            let (_, grid) =
                file_reader::load_sheet(&state.config, file_name, request.sheet_name.clone()).await?;
            grid.headers
        }
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Either columns or fileName is required".to_string(),
            ))
        }
    };

    let categorization =
        brand_categorizer::categorize(&columns, &request.client_brand, &request.halo_brands);

    let metadata_file = match &request.file_name {
        Some(file_name) => match state.metadata.find_for_file(file_name).await? {
            Some(workbook) => {
                let info = BrandInfo {
                    client_brand: Some(
                        categorization
                            .our_brand
                            .clone()
                            .unwrap_or_else(|| request.client_brand.trim().to_string()),
                    ),
                    competitors: categorization.competitors.clone(),
                    halo_brands: categorization.halo_brands.clone(),
                    target_variable: None,
                    updated_at: None,
                };
                state.metadata.set_brand_info(&workbook, info).await?;
                Some(workbook)
            }
            None => None,
        },
        None => None,
    };

    tracing::info!(
        client_brand = %request.client_brand,
        brands = categorization.all_brands.len(),
        competitors = categorization.competitors.len(),
        "Categorized brands"
    );

    Ok(Json(ApiResponse::ok(CategorizeResponse {
        categorization,
        metadata_file,
    })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/brands/analyses", post(create_analysis).get(list_analyses))
        .route(
            "/api/brands/analyses/:id",
            get(get_analysis).put(update_analysis).delete(delete_analysis),
        )
        .route("/api/brands/categorize", post(categorize_brands))
        .route("/api/brands/:brandName/exists", get(brand_exists))
}
