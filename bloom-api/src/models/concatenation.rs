//! Concatenation step snapshot
//!
//! Records what the Python backend produced for an upload so the wizard can
//! restore the concatenation step later. Fields the client sends that are not
//! modelled here are kept verbatim in `extra`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Brand categorization captured alongside the concatenation state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandMetadata {
    #[serde(default)]
    pub target_variable: Option<String>,
    #[serde(default)]
    pub client_brand: Option<String>,
    #[serde(default)]
    pub competitors: Vec<String>,
    #[serde(default)]
    pub halo_brands: Vec<String>,
    #[serde(default)]
    pub categorized_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcatenationState {
    pub original_file_name: String,
    #[serde(default)]
    pub concatenated_file_name: Option<String>,
    #[serde(default)]
    pub selected_sheets: Vec<String>,
    #[serde(default)]
    pub target_variable: Option<String>,
    #[serde(default)]
    pub selected_filters: Vec<String>,
    #[serde(default)]
    pub brand_metadata: Option<BrandMetadata>,
    #[serde(default)]
    pub preview_data: Vec<Map<String, Value>>,
    /// Category name → columns, as assigned by the Python backend
    #[serde(default)]
    pub column_categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub total_rows: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConcatenationState {
    pub fn new(original_file_name: impl Into<String>) -> Self {
        Self {
            original_file_name: original_file_name.into(),
            concatenated_file_name: None,
            selected_sheets: Vec::new(),
            target_variable: None,
            selected_filters: Vec::new(),
            brand_metadata: None,
            preview_data: Vec::new(),
            column_categories: BTreeMap::new(),
            total_rows: None,
            status: None,
            processed_at: None,
            saved_at: None,
            last_updated: None,
            extra: Map::new(),
        }
    }
}
