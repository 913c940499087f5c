//! Upload validation and storage
//!
//! Uploads land in `<root>/uploads/` under a timestamped name. A file is only
//! kept if it parses: the response carries its columns and sheet list so the
//! wizard can move straight on to sheet selection.

use crate::models::UploadedFile;
use crate::services::file_reader::{self, FileKind, LocatedFile};
use bloom_common::config::ServerConfig;
use bloom_common::naming::{split_extension, timestamped_filename};
use bloom_common::{Error, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Extensions accepted for upload (lowercase, without the dot)
pub const ALLOWED_EXTENSIONS: &[&str] = &["xlsx", "csv"];

/// Check the name and size of an incoming file; returns the lowercase extension
pub fn validate_upload(original_name: &str, size: u64, max_bytes: u64) -> Result<String> {
    let name = original_name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("No file name provided".to_string()));
    }

    let ext = split_extension(name)
        .1
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "Invalid file type: {}. Allowed types: .xlsx, .csv",
                name
            ))
        })?;

    if size == 0 {
        return Err(Error::InvalidInput("Uploaded file is empty".to_string()));
    }
    if size > max_bytes {
        return Err(Error::InvalidInput(format!(
            "File too large: {} bytes (limit {} bytes)",
            size, max_bytes
        )));
    }

    Ok(ext)
}

/// Upper bound on `-N` suffixes tried for one stored name
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Write `bytes` under `base_name`, or `<stem>-2.<ext>`, `<stem>-3.<ext>`, ... when taken.
///
/// The file is opened with `create_new`, so two uploads racing for one name
/// can never write to the same file.
pub(crate) async fn write_new_file(
    dir: &Path,
    base_name: &str,
    bytes: &[u8],
) -> Result<(String, PathBuf)> {
    let (stem, ext) = split_extension(base_name);
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let name = match (attempt, &ext) {
            (1, _) => base_name.to_string(),
            (_, Some(ext)) => format!("{}-{}.{}", stem, attempt, ext),
            (_, None) => format!("{}-{}", stem, attempt),
        };
        let path = dir.join(&name);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await
        {
            drop(file);
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                warn!(file = %name, error = %remove_err, "Failed to remove partial upload");
            }
            return Err(e.into());
        }
        return Ok((name, path));
    }
    Err(Error::Internal(format!(
        "No free stored name for {} after {} attempts",
        base_name, MAX_NAME_ATTEMPTS
    )))
}

/// Validate, persist and parse an upload
pub async fn store_upload(
    config: &ServerConfig,
    original_name: &str,
    bytes: &[u8],
) -> Result<UploadedFile> {
    // Browsers may send a full client-side path
    let original_name = original_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(original_name)
        .trim()
        .to_string();
    let extension = validate_upload(&original_name, bytes.len() as u64, config.max_upload_bytes)?;

    let uploads_dir = config.uploads_dir();
    tokio::fs::create_dir_all(&uploads_dir).await?;

    let uploaded_at = Utc::now();
    let base_name = timestamped_filename(&original_name, uploaded_at);
    let (stored_name, path) = write_new_file(&uploads_dir, &base_name, bytes).await?;

    let located = LocatedFile {
        name: stored_name.clone(),
        path: path.clone(),
        kind: FileKind::from_name(&stored_name)?,
        location: "uploads",
    };
    let parsed = tokio::task::spawn_blocking(move || file_reader::read_all_sheets(&located))
        .await
        .map_err(|e| Error::Internal(format!("Upload parse task failed: {}", e)))?;

    let sheets = match parsed {
        Ok(sheets) => sheets,
        Err(e) => {
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                warn!(file = %stored_name, error = %remove_err, "Failed to remove unreadable upload");
            }
            return Err(e);
        }
    };

    let columns = sheets
        .first()
        .map(|(_, grid)| grid.headers.clone())
        .unwrap_or_default();
    let sheets: Vec<_> = sheets
        .iter()
        .map(|(name, grid)| file_reader::sheet_info(name, grid))
        .collect();

    info!(
        original = %original_name,
        stored = %stored_name,
        size = bytes.len(),
        sheets = sheets.len(),
        "Stored upload"
    );

    Ok(UploadedFile {
        original_name,
        stored_name,
        size: bytes.len() as u64,
        extension,
        uploaded_at,
        columns,
        sheets,
    })
}
