//! Analysis records (one per brand and analysis type)
//!
//! Records live in `<root>/analyses/<analysisId>.json`. IDs are derived from
//! the cleaned brand name, so creating the same brand twice hits the same
//! document and must be confirmed with `forceOverwrite`.

use crate::models::{AnalysisRecord, CreateAnalysisRequest};
use crate::services::metadata_manager::{remove_matching_files, MetadataManager};
use bloom_common::config::ServerConfig;
use bloom_common::json_store::{expect_object, merge_json};
use bloom_common::naming::{analysis_id, filename_matches_brand, slugify, validate_brand_name, AnalysisType};
use bloom_common::{time, Error, JsonStore, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Fields a client update may never change
const IMMUTABLE_FIELDS: &[&str] = &["analysisId", "brandName", "analysisType", "createdAt"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandExists {
    pub brand_name: String,
    pub exists: bool,
    pub analyses: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedAnalysis {
    pub analysis_id: String,
    pub removed_files: Vec<String>,
}

#[derive(Clone)]
pub struct BrandHandler {
    config: Arc<ServerConfig>,
    analyses: JsonStore,
    metadata: MetadataManager,
}

impl BrandHandler {
    pub fn new(config: Arc<ServerConfig>, metadata: MetadataManager) -> Self {
        let analyses = JsonStore::new(config.analyses_dir());
        Self {
            config,
            analyses,
            metadata,
        }
    }

    /// Create a record; `(record, replaced_existing)`
    pub async fn create(&self, request: CreateAnalysisRequest) -> Result<(AnalysisRecord, bool)> {
        let brand_name = validate_brand_name(&request.brand_name)?;
        let id = analysis_id(&brand_name, request.analysis_type)?;

        let existed = self.analyses.exists(&id).await?;
        if existed && !request.force_overwrite {
            return Err(Error::Conflict(format!(
                "Analysis already exists for brand '{}' ({})",
                brand_name, id
            )));
        }

        let record = AnalysisRecord::new(id.clone(), brand_name, request.analysis_type);
        self.analyses.write(&id, &record).await?;

        info!(analysis_id = %id, overwritten = existed, "Created analysis");
        Ok((record, existed))
    }

    /// All records, most recently modified first
    pub async fn list(&self, analysis_type: Option<AnalysisType>) -> Result<Vec<AnalysisRecord>> {
        let mut records: Vec<AnalysisRecord> = self
            .analyses
            .list()
            .await?
            .into_iter()
            .map(|(_, record)| record)
            .filter(|record: &AnalysisRecord| analysis_type.map_or(true, |t| record.analysis_type == t))
            .collect();
        records.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(records)
    }

    pub async fn get(&self, id: &str) -> Result<AnalysisRecord> {
        self.analyses
            .read(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Analysis not found: {}", id)))
    }

    /// Merge `patch` into the record, keeping identity fields fixed
    pub async fn update(&self, id: &str, patch: Value) -> Result<AnalysisRecord> {
        expect_object(&patch, "Analysis update")?;

        let updated = self
            .analyses
            .update(id, |current| {
                let mut document =
                    current.ok_or_else(|| Error::NotFound(format!("Analysis not found: {}", id)))?;
                let preserved: Vec<(&str, Value)> = IMMUTABLE_FIELDS
                    .iter()
                    .map(|field| (*field, document[*field].clone()))
                    .collect();

                merge_json(&mut document, patch);
                for (field, value) in preserved {
                    document[field] = value;
                }
                document["lastModified"] = json!(time::now());

                serde_json::from_value::<AnalysisRecord>(document.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid analysis update: {}", e)))?;
                Ok(document)
            })
            .await?;

        info!(analysis_id = %id, "Updated analysis");
        Ok(serde_json::from_value(updated)?)
    }

    /// Remove the record, then best-effort remove the brand's files
    pub async fn delete(&self, id: &str) -> Result<DeletedAnalysis> {
        let record = self.get(id).await?;
        if !self.analyses.delete(id).await? {
            return Err(Error::NotFound(format!("Analysis not found: {}", id)));
        }

        let slug = slugify(&record.brand_name);
        let matches = |name: &str| filename_matches_brand(name, &slug);
        let mut removed_files = Vec::new();

        for dir in [self.config.uploads_dir(), self.config.processed_dir()] {
            match remove_matching_files(&dir, matches).await {
                Ok(files) => removed_files.extend(files),
                Err(e) => warn!(dir = %dir.display(), error = %e, "File cleanup failed"),
            }
        }
        match self.metadata.delete_matching(matches).await {
            Ok(files) => removed_files.extend(files),
            Err(e) => warn!(error = %e, "Metadata cleanup failed"),
        }

        info!(analysis_id = %id, removed = removed_files.len(), "Deleted analysis");
        Ok(DeletedAnalysis {
            analysis_id: id.to_string(),
            removed_files,
        })
    }

    /// Which analysis types already exist for a brand
    pub async fn exists(&self, brand_name: &str) -> Result<BrandExists> {
        let cleaned = validate_brand_name(brand_name)?;
        let mut analyses = Vec::new();
        for analysis_type in [AnalysisType::Mmm, AnalysisType::NonMmm] {
            let id = analysis_id(&cleaned, analysis_type)?;
            if self.analyses.exists(&id).await? {
                analyses.push(id);
            }
        }

        Ok(BrandExists {
            brand_name: cleaned,
            exists: !analyses.is_empty(),
            analyses,
        })
    }
}
