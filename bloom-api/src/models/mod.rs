//! Data models persisted or exchanged by the API

pub mod analysis;
pub mod concatenation;
pub mod files;
pub mod filters;
pub mod metadata;

pub use analysis::{AnalysisFiles, AnalysisProgress, AnalysisRecord, AnalysisStatus, CreateAnalysisRequest};
pub use concatenation::{BrandMetadata, ConcatenationState};
pub use files::{CellGrid, FileInfo, SheetInfo, UploadedFile};
pub use filters::{AvailableColumn, FilterState, FilterSuggestion, SuggestionPriority, ValidationResult};
pub use metadata::{BrandInfo, FilterColumnEntry, LogEntry, MetadataFileInfo, MetadataWorkbook};

/// Schema version stamped on every persisted document
pub const SCHEMA_VERSION: &str = "1.0";

pub(crate) fn schema_version() -> String {
    SCHEMA_VERSION.to_string()
}
