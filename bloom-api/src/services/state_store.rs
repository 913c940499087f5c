//! Concatenation and non-MMM state documents
//!
//! Both are thin typed layers over [`JsonStore`]: concatenation states are
//! keyed by the sanitized stem of the original file name, non-MMM states by
//! analysis ID.

use crate::models::ConcatenationState;
use bloom_common::json_store::{expect_object, merge_json};
use bloom_common::naming::document_key;
use bloom_common::{time, Error, JsonStore, Result};
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Clone)]
pub struct ConcatenationStates {
    store: JsonStore,
}

impl ConcatenationStates {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    fn key(original_file_name: &str) -> Result<String> {
        bloom_common::naming::validate_plain_filename(original_file_name)?;
        Ok(document_key(original_file_name))
    }

    /// Create or replace the state for `original_file_name`
    pub async fn save(&self, original_file_name: &str, body: Value) -> Result<ConcatenationState> {
        expect_object(&body, "Concatenation state")?;
        let key = Self::key(original_file_name)?;

        let mut document = body;
        document["originalFileName"] = json!(original_file_name);
        let mut state: ConcatenationState = serde_json::from_value(document)
            .map_err(|e| Error::InvalidInput(format!("Invalid concatenation state: {}", e)))?;
        let now = time::now();
        state.saved_at = Some(now);
        state.last_updated = Some(now);

        self.store.write(&key, &state).await?;
        info!(file = %original_file_name, sheets = state.selected_sheets.len(), "Saved concatenation state");
        Ok(state)
    }

    pub async fn get(&self, original_file_name: &str) -> Result<ConcatenationState> {
        let key = Self::key(original_file_name)?;
        self.store
            .read::<ConcatenationState>(&key)
            .await?
            .filter(|state| state.original_file_name == original_file_name)
            .ok_or_else(|| {
                Error::NotFound(format!("No concatenation state for {}", original_file_name))
            })
    }

    /// Merge `patch` into the existing state
    pub async fn update(&self, original_file_name: &str, patch: Value) -> Result<ConcatenationState> {
        expect_object(&patch, "Concatenation state update")?;
        let key = Self::key(original_file_name)?;

        let updated = self
            .store
            .update(&key, |current| {
                let mut document = current
                    .filter(|doc| doc["originalFileName"] == original_file_name)
                    .ok_or_else(|| {
                        Error::NotFound(format!("No concatenation state for {}", original_file_name))
                    })?;
                let original = document["originalFileName"].clone();
                merge_json(&mut document, patch);
                document["originalFileName"] = original;
                document["lastUpdated"] = json!(time::now_rfc3339());

                // Reject patches that break the document shape before writing
                serde_json::from_value::<ConcatenationState>(document.clone()).map_err(|e| {
                    Error::InvalidInput(format!("Invalid concatenation state: {}", e))
                })?;
                Ok(document)
            })
            .await?;

        Ok(serde_json::from_value(updated)?)
    }

    pub async fn delete(&self, original_file_name: &str) -> Result<()> {
        let key = Self::key(original_file_name)?;
        if !self.store.delete(&key).await? {
            return Err(Error::NotFound(format!(
                "No concatenation state for {}",
                original_file_name
            )));
        }
        info!(file = %original_file_name, "Deleted concatenation state");
        Ok(())
    }

    /// All states, most recently updated first
    pub async fn list(&self) -> Result<Vec<ConcatenationState>> {
        let mut states: Vec<ConcatenationState> =
            self.store.list().await?.into_iter().map(|(_, s)| s).collect();
        states.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(states)
    }
}

#[derive(Debug, Clone)]
pub struct NonMmmStates {
    store: JsonStore,
}

impl NonMmmStates {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    /// Replace the free-form state document of an analysis
    pub async fn save(&self, analysis_id: &str, body: Value) -> Result<Value> {
        expect_object(&body, "Non-MMM state")?;
        let mut document = body;
        document["analysisId"] = json!(analysis_id);
        document["savedAt"] = json!(time::now_rfc3339());
        document["schemaVersion"] = json!(crate::models::SCHEMA_VERSION);

        self.store.write(analysis_id, &document).await?;
        info!(analysis_id = %analysis_id, "Saved non-MMM state");
        Ok(document)
    }

    pub async fn get(&self, analysis_id: &str) -> Result<Value> {
        self.store
            .read(analysis_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No non-MMM state for {}", analysis_id)))
    }

    pub async fn delete(&self, analysis_id: &str) -> Result<bool> {
        self.store.delete(analysis_id).await
    }
}
