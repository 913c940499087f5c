//! File-backed JSON document storage
//!
//! One document per file (`<dir>/<key>.json`). Writes go to a temp file and
//! are renamed into place. Read-modify-write cycles through [`JsonStore::update`]
//! are serialized per store, so two concurrent updates in this process cannot
//! lose each other's changes. Nothing protects against other processes.

use crate::naming::validate_plain_filename;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_plain_filename(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    /// Read a document; `Ok(None)` when it does not exist
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key)?;
        read_document(&path).await
    }

    /// Create or replace a document
    pub async fn write<T: Serialize>(&self, key: &str, document: &T) -> Result<()> {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock().await;
        write_document(&path, document).await
    }

    /// Read-modify-write under the store lock.
    ///
    /// `f` receives the current document (if any) and returns the document to
    /// persist. Errors from `f` abort the write.
    pub async fn update<F>(&self, key: &str, f: F) -> Result<Value>
    where
        F: FnOnce(Option<Value>) -> Result<Value>,
    {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock().await;
        let current: Option<Value> = read_document(&path).await?;
        let next = f(current)?;
        write_document(&path, &next).await?;
        Ok(next)
    }

    /// Delete a document; returns false if it did not exist
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted document");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// All readable documents as `(key, document)`. Corrupted files are skipped.
    pub async fn list<T: DeserializeOwned>(&self) -> Result<Vec<(String, T)>> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let key = match path.file_stem().and_then(|s| s.to_str()) {
                Some(key) => key.to_string(),
                None => continue,
            };
            match read_document::<T>(&path).await {
                Ok(Some(doc)) => out.push((key, doc)),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable document"),
            }
        }

        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

async fn write_document<T: Serialize>(path: &Path, document: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(document)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote document");
    Ok(())
}

/// Merge `patch` into `target`.
///
/// Objects merge key by key, recursively. Any other patch value replaces the
/// target value outright (arrays are not concatenated).
pub fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                let nested = value.is_object()
                    && target_map.get(&key).map_or(false, Value::is_object);
                if nested {
                    if let Some(existing) = target_map.get_mut(&key) {
                        merge_json(existing, value);
                    }
                } else {
                    target_map.insert(key, value);
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Require a JSON object, as request bodies for document updates must be
pub fn expect_object(value: &Value, what: &str) -> Result<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("{} must be a JSON object", what)))
    }
}
