//! Contents of the per-upload metadata workbook
//!
//! The workbook has four fixed sheets: `FileInfo` and `BrandInfo` are
//! property/value pairs, `ProcessingLog` and `FilterColumns` are tables.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataFileInfo {
    pub original_file_name: String,
    pub stored_file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub sheet_count: usize,
    pub row_count: usize,
    pub column_count: usize,
    pub brand_name: Option<String>,
    pub analysis_type: Option<String>,
    /// RFC 3339
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// RFC 3339
    pub timestamp: String,
    pub step: String,
    pub status: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterColumnEntry {
    pub column_name: String,
    pub order: usize,
    /// RFC 3339
    pub added_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandInfo {
    #[serde(default)]
    pub client_brand: Option<String>,
    #[serde(default)]
    pub competitors: Vec<String>,
    #[serde(default)]
    pub halo_brands: Vec<String>,
    #[serde(default)]
    pub target_variable: Option<String>,
    /// RFC 3339, set by the server on write
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataWorkbook {
    pub file_info: MetadataFileInfo,
    pub processing_log: Vec<LogEntry>,
    pub filter_columns: Vec<FilterColumnEntry>,
    pub brand_info: BrandInfo,
}
