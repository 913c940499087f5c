//! Metadata Excel workbook bookkeeping
//!
//! Each upload gets `<root>/metadata/<document key>_metadata.xlsx` with four sheets:
//! FileInfo, ProcessingLog, FilterColumns and BrandInfo. The workbook is the
//! unit of update: every change reads the whole workbook with `calamine`,
//! modifies it in memory and rewrites it with `rust_xlsxwriter`.

use crate::models::{
    BrandInfo, FilterColumnEntry, LogEntry, MetadataFileInfo, MetadataWorkbook,
};
use crate::services::file_reader::{self, cell_to_json, value_as_text};
use bloom_common::config::ServerConfig;
use bloom_common::naming::{document_key, split_extension, validate_plain_filename};
use bloom_common::{time, Error, Result};
use calamine::{open_workbook_auto, Reader};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const SHEET_FILE_INFO: &str = "FileInfo";
pub const SHEET_PROCESSING_LOG: &str = "ProcessingLog";
pub const SHEET_FILTER_COLUMNS: &str = "FilterColumns";
pub const SHEET_BRAND_INFO: &str = "BrandInfo";

const WORKBOOK_SUFFIX: &str = "_metadata.xlsx";

/// Separator for list values in property/value sheets
const LIST_SEPARATOR: &str = "; ";

/// POST /api/metadata/create request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMetadataRequest {
    pub original_file_name: String,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub analysis_type: Option<String>,
}

/// POST /api/metadata/file/:metadataFile/log request
#[derive(Debug, Clone, Deserialize)]
pub struct LogRequest {
    pub step: String,
    #[serde(default = "default_log_status")]
    pub status: String,
    #[serde(default)]
    pub details: String,
}

fn default_log_status() -> String {
    "completed".to_string()
}

#[derive(Clone)]
pub struct MetadataManager {
    config: Arc<ServerConfig>,
    write_lock: Arc<Mutex<()>>,
}

impl MetadataManager {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            config,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Workbook file name for an uploaded file
    pub fn workbook_name(original_file_name: &str) -> String {
        format!("{}{}", document_key(original_file_name), WORKBOOK_SUFFIX)
    }

    fn path_for(&self, workbook_name: &str) -> Result<PathBuf> {
        validate_plain_filename(workbook_name)?;
        if split_extension(workbook_name).1.as_deref() != Some("xlsx") {
            return Err(Error::InvalidInput(format!(
                "Metadata file must be an .xlsx workbook: {}",
                workbook_name
            )));
        }
        Ok(self.config.metadata_dir().join(workbook_name))
    }

    /// Name of the existing workbook for `file_name`, if one was created
    pub async fn find_for_file(&self, file_name: &str) -> Result<Option<String>> {
        let name = Self::workbook_name(file_name);
        let path = self.path_for(&name)?;
        Ok(tokio::fs::try_exists(&path).await?.then_some(name))
    }

    /// Create (or recreate) the workbook for an uploaded file
    pub async fn create(&self, request: CreateMetadataRequest) -> Result<(String, MetadataWorkbook)> {
        let stored = request.original_file_name.clone();
        let sheets = file_reader::with_file(&self.config, &stored, file_reader::read_all_sheets).await?;
        let file_path = file_reader::locate(&self.config, &stored)?.path;
        let size = tokio::fs::metadata(&file_path).await?.len();

        let (row_count, column_count) = sheets
            .first()
            .map(|(_, grid)| (grid.rows.len(), grid.headers.len()))
            .unwrap_or((0, 0));
        let now = time::now_rfc3339();

        let workbook = MetadataWorkbook {
            file_info: MetadataFileInfo {
                original_file_name: request.original_file_name.clone(),
                stored_file_name: stored.clone(),
                file_size: size,
                file_type: split_extension(&stored).1.unwrap_or_default(),
                sheet_count: sheets.len(),
                row_count,
                column_count,
                brand_name: request.brand_name.clone(),
                analysis_type: request.analysis_type.clone(),
                created_at: now.clone(),
            },
            processing_log: vec![LogEntry {
                timestamp: now,
                step: "created".to_string(),
                status: "completed".to_string(),
                details: format!("Metadata created for {}", stored),
            }],
            filter_columns: Vec::new(),
            brand_info: BrandInfo {
                client_brand: request.brand_name,
                ..Default::default()
            },
        };

        let name = Self::workbook_name(&stored);
        let path = self.path_for(&name)?;
        {
            let _guard = self.write_lock.lock().await;
            let to_write = workbook.clone();
            tokio::task::spawn_blocking(move || write_workbook(&path, &to_write))
                .await
                .map_err(|e| Error::Internal(format!("Metadata write task failed: {}", e)))??;
        }

        info!(metadata_file = %name, file = %stored, "Created metadata workbook");
        Ok((name, workbook))
    }

    pub async fn read(&self, workbook_name: &str) -> Result<MetadataWorkbook> {
        let path = self.path_for(workbook_name)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::NotFound(format!("Metadata file not found: {}", workbook_name)));
        }
        tokio::task::spawn_blocking(move || read_workbook(&path))
            .await
            .map_err(|e| Error::Internal(format!("Metadata read task failed: {}", e)))?
    }

    /// Read, apply `f`, rewrite. Serialized across all workbooks.
    async fn modify<F>(&self, workbook_name: &str, f: F) -> Result<MetadataWorkbook>
    where
        F: FnOnce(&mut MetadataWorkbook) + Send + 'static,
    {
        let path = self.path_for(workbook_name)?;
        let _guard = self.write_lock.lock().await;
        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::NotFound(format!("Metadata file not found: {}", workbook_name)));
        }
        tokio::task::spawn_blocking(move || {
            let mut workbook = read_workbook(&path)?;
            f(&mut workbook);
            write_workbook(&path, &workbook)?;
            Ok(workbook)
        })
        .await
        .map_err(|e| Error::Internal(format!("Metadata update task failed: {}", e)))?
    }

    pub async fn append_log(&self, workbook_name: &str, request: LogRequest) -> Result<MetadataWorkbook> {
        if request.step.trim().is_empty() {
            return Err(Error::InvalidInput("Log step is required".to_string()));
        }
        self.modify(workbook_name, move |wb| {
            wb.processing_log.push(LogEntry {
                timestamp: time::now_rfc3339(),
                step: request.step,
                status: request.status,
                details: request.details,
            });
        })
        .await
    }

    /// Replace the FilterColumns sheet and log the change
    pub async fn set_filters(&self, workbook_name: &str, columns: Vec<String>) -> Result<MetadataWorkbook> {
        self.modify(workbook_name, move |wb| {
            let now = time::now_rfc3339();
            wb.filter_columns = columns
                .iter()
                .enumerate()
                .map(|(i, column)| FilterColumnEntry {
                    column_name: column.clone(),
                    order: i + 1,
                    added_at: now.clone(),
                })
                .collect();
            wb.processing_log.push(LogEntry {
                timestamp: now,
                step: "filters".to_string(),
                status: "completed".to_string(),
                details: format!("{} filter column(s) selected", columns.len()),
            });
        })
        .await
    }

    /// Replace the BrandInfo sheet and log the change; an absent target variable keeps the stored one
    pub async fn set_brand_info(&self, workbook_name: &str, mut info: BrandInfo) -> Result<MetadataWorkbook> {
        self.modify(workbook_name, move |wb| {
            let now = time::now_rfc3339();
            info.updated_at = Some(now.clone());
            if info.target_variable.is_none() {
                info.target_variable = wb.brand_info.target_variable.take();
            }
            let details = format!(
                "Brand categorization: {} competitor(s), {} halo brand(s)",
                info.competitors.len(),
                info.halo_brands.len()
            );
            wb.brand_info = info;
            wb.processing_log.push(LogEntry {
                timestamp: now,
                step: "brand_categorization".to_string(),
                status: "completed".to_string(),
                details,
            });
        })
        .await
    }

    /// Delete every workbook whose name matches `predicate`; returns removed names
    pub async fn delete_matching<P>(&self, predicate: P) -> Result<Vec<String>>
    where
        P: Fn(&str) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        remove_matching_files(&self.config.metadata_dir(), predicate).await
    }
}

/// Best-effort removal of regular files in `dir` whose name matches
pub(crate) async fn remove_matching_files<P>(dir: &Path, predicate: P) -> Result<Vec<String>>
where
    P: Fn(&str) -> bool,
{
    let mut removed = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if !entry.file_type().await?.is_file() || !predicate(&name) {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed.push(name),
            Err(e) => warn!(file = %name, error = %e, "Failed to remove file during cleanup"),
        }
    }

    removed.sort();
    Ok(removed)
}

fn xlsx_error(err: XlsxError) -> Error {
    Error::Internal(format!("Failed to write metadata workbook: {}", err))
}

fn write_pairs(sheet: &mut Worksheet, pairs: &[(&str, String)]) -> std::result::Result<(), XlsxError> {
    sheet.write_string(0, 0, "Property")?;
    sheet.write_string(0, 1, "Value")?;
    for (i, (key, value)) in pairs.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, *key)?;
        sheet.write_string(row, 1, value)?;
    }
    Ok(())
}

fn write_table(
    sheet: &mut Worksheet,
    headers: &[&str],
    rows: &[Vec<String>],
) -> std::result::Result<(), XlsxError> {
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }
    for (i, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            sheet.write_string((i + 1) as u32, col as u16, value)?;
        }
    }
    Ok(())
}

fn file_info_pairs(info: &MetadataFileInfo) -> Vec<(&'static str, String)> {
    vec![
        ("Original File Name", info.original_file_name.clone()),
        ("Stored File Name", info.stored_file_name.clone()),
        ("File Size (bytes)", info.file_size.to_string()),
        ("File Type", info.file_type.clone()),
        ("Sheet Count", info.sheet_count.to_string()),
        ("Row Count", info.row_count.to_string()),
        ("Column Count", info.column_count.to_string()),
        ("Brand Name", info.brand_name.clone().unwrap_or_default()),
        ("Analysis Type", info.analysis_type.clone().unwrap_or_default()),
        ("Created At", info.created_at.clone()),
    ]
}

fn brand_info_pairs(info: &BrandInfo) -> Vec<(&'static str, String)> {
    vec![
        ("Client Brand", info.client_brand.clone().unwrap_or_default()),
        ("Competitors", info.competitors.join(LIST_SEPARATOR)),
        ("Halo Brands", info.halo_brands.join(LIST_SEPARATOR)),
        ("Target Variable", info.target_variable.clone().unwrap_or_default()),
        ("Updated At", info.updated_at.clone().unwrap_or_default()),
    ]
}

/// Write the whole workbook to `path` (temp file + rename)
pub(crate) fn write_workbook(path: &Path, wb: &MetadataWorkbook) -> Result<()> {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_FILE_INFO).map_err(xlsx_error)?;
    write_pairs(sheet, &file_info_pairs(&wb.file_info)).map_err(xlsx_error)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_PROCESSING_LOG).map_err(xlsx_error)?;
    let log_rows: Vec<Vec<String>> = wb
        .processing_log
        .iter()
        .map(|e| vec![e.timestamp.clone(), e.step.clone(), e.status.clone(), e.details.clone()])
        .collect();
    write_table(sheet, &["Timestamp", "Step", "Status", "Details"], &log_rows).map_err(xlsx_error)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_FILTER_COLUMNS).map_err(xlsx_error)?;
    let filter_rows: Vec<Vec<String>> = wb
        .filter_columns
        .iter()
        .map(|f| vec![f.order.to_string(), f.column_name.clone(), f.added_at.clone()])
        .collect();
    write_table(sheet, &["Order", "Column Name", "Added At"], &filter_rows).map_err(xlsx_error)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_BRAND_INFO).map_err(xlsx_error)?;
    write_pairs(sheet, &brand_info_pairs(&wb.brand_info)).map_err(xlsx_error)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("xlsx.tmp");
    workbook.save(&tmp).map_err(xlsx_error)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Sheet rows as text, header row dropped. Missing sheets read as empty.
fn sheet_rows(
    workbook: &mut calamine::Sheets<std::io::BufReader<std::fs::File>>,
    name: &str,
) -> Vec<Vec<String>> {
    match workbook.worksheet_range(name) {
        Ok(range) => range
            .rows()
            .skip(1)
            .map(|row| {
                row.iter()
                    .map(|cell| value_as_text(&cell_to_json(cell)).unwrap_or_default())
                    .collect::<Vec<String>>()
            })
            .filter(|row| row.iter().any(|v| !v.is_empty()))
            .collect(),
        Err(e) => {
            warn!(sheet = name, error = %e, "Metadata sheet unreadable; treating as empty");
            Vec::new()
        }
    }
}

fn pairs_map(rows: Vec<Vec<String>>) -> HashMap<String, String> {
    rows.into_iter()
        .filter_map(|mut row| {
            if row.is_empty() {
                return None;
            }
            let value = if row.len() > 1 { row.swap_remove(1) } else { String::new() };
            Some((row.swap_remove(0), value))
        })
        .collect()
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

fn split_list(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn cell(row: &[String], idx: usize) -> String {
    row.get(idx).cloned().unwrap_or_default()
}

/// Parse a workbook written by [`write_workbook`]
pub(crate) fn read_workbook(path: &Path) -> Result<MetadataWorkbook> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        Error::Internal(format!("Failed to read metadata workbook {}: {}", path.display(), e))
    })?;

    let info = pairs_map(sheet_rows(&mut workbook, SHEET_FILE_INFO));
    let parse_num = |key: &str| -> u64 {
        info.get(key)
            .and_then(|v| v.parse::<f64>().ok())
            .map(|f| f as u64)
            .unwrap_or(0)
    };
    let file_info = MetadataFileInfo {
        original_file_name: info.get("Original File Name").cloned().unwrap_or_default(),
        stored_file_name: info.get("Stored File Name").cloned().unwrap_or_default(),
        file_size: parse_num("File Size (bytes)"),
        file_type: info.get("File Type").cloned().unwrap_or_default(),
        sheet_count: parse_num("Sheet Count") as usize,
        row_count: parse_num("Row Count") as usize,
        column_count: parse_num("Column Count") as usize,
        brand_name: non_empty(info.get("Brand Name")),
        analysis_type: non_empty(info.get("Analysis Type")),
        created_at: info.get("Created At").cloned().unwrap_or_default(),
    };

    let processing_log = sheet_rows(&mut workbook, SHEET_PROCESSING_LOG)
        .into_iter()
        .map(|row| LogEntry {
            timestamp: cell(&row, 0),
            step: cell(&row, 1),
            status: cell(&row, 2),
            details: cell(&row, 3),
        })
        .collect();

    let filter_columns = sheet_rows(&mut workbook, SHEET_FILTER_COLUMNS)
        .into_iter()
        .enumerate()
        .map(|(i, row)| FilterColumnEntry {
            order: cell(&row, 0).parse::<f64>().map(|f| f as usize).unwrap_or(i + 1),
            column_name: cell(&row, 1),
            added_at: cell(&row, 2),
        })
        .collect();

    let brand = pairs_map(sheet_rows(&mut workbook, SHEET_BRAND_INFO));
    let brand_info = BrandInfo {
        client_brand: non_empty(brand.get("Client Brand")),
        competitors: split_list(brand.get("Competitors")),
        halo_brands: split_list(brand.get("Halo Brands")),
        target_variable: non_empty(brand.get("Target Variable")),
        updated_at: non_empty(brand.get("Updated At")),
    };

    Ok(MetadataWorkbook {
        file_info,
        processing_log,
        filter_columns,
        brand_info,
    })
}
