//! Analysis workflow record
//!
//! One record per (brand, analysis type). The wizard front end advances
//! `currentStep` and flips progress flags as the user moves through it.

use bloom_common::naming::AnalysisType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Analysis lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Created,
    InProgress,
    Completed,
    Error,
}

/// Files attached to an analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFiles {
    pub original_file_name: Option<String>,
    pub uploaded_file_name: Option<String>,
    pub concatenated_file_name: Option<String>,
    pub metadata_file_name: Option<String>,
}

/// Wizard progress flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisProgress {
    pub data_uploaded: bool,
    pub concatenation_completed: bool,
    pub target_variable_selected: bool,
    pub filters_applied: bool,
    pub brand_categorized: bool,
    pub model_built: bool,
}

/// Persisted analysis record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub analysis_id: String,
    pub brand_name: String,
    pub analysis_type: AnalysisType,
    /// 1-based wizard step
    pub current_step: u32,
    pub status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub files: AnalysisFiles,
    #[serde(default)]
    pub progress: AnalysisProgress,
    #[serde(default)]
    pub concatenation_state: Option<Value>,
    #[serde(default)]
    pub filter_state: Option<Value>,
    #[serde(default)]
    pub model_state: Option<Value>,
    #[serde(default = "super::schema_version")]
    pub schema_version: String,
}

impl AnalysisRecord {
    pub fn new(analysis_id: String, brand_name: String, analysis_type: AnalysisType) -> Self {
        let now = Utc::now();
        Self {
            analysis_id,
            brand_name,
            analysis_type,
            current_step: 1,
            status: AnalysisStatus::Created,
            created_at: now,
            last_modified: now,
            files: AnalysisFiles::default(),
            progress: AnalysisProgress::default(),
            concatenation_state: None,
            filter_state: None,
            model_state: None,
            schema_version: super::schema_version(),
        }
    }
}

/// POST /api/brands/analyses request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnalysisRequest {
    pub brand_name: String,
    #[serde(default)]
    pub analysis_type: AnalysisType,
    #[serde(default)]
    pub force_overwrite: bool,
}
