//! Excel/CSV reading
//!
//! Thin wrappers over `calamine` and `csv` that turn a sheet into a
//! [`CellGrid`]. Everything here is blocking; handlers call it through
//! `tokio::task::spawn_blocking`.

use crate::models::{CellGrid, FileInfo, SheetInfo};
use bloom_common::config::ServerConfig;
use bloom_common::naming::{split_extension, validate_plain_filename};
use bloom_common::{Error, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name given to the single sheet of a CSV file
pub const CSV_SHEET_NAME: &str = "Sheet1";

/// Spreadsheet formats the reader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Workbook,
    Csv,
}

impl FileKind {
    pub fn from_name(name: &str) -> Result<Self> {
        match split_extension(name).1.as_deref() {
            Some("xlsx") | Some("xls") | Some("xlsm") => Ok(FileKind::Workbook),
            Some("csv") => Ok(FileKind::Csv),
            _ => Err(Error::InvalidInput(format!("Unsupported file type: {}", name))),
        }
    }
}

/// A file resolved inside the data root
#[derive(Debug, Clone)]
pub struct LocatedFile {
    pub name: String,
    pub path: PathBuf,
    pub kind: FileKind,
    /// `uploads` or `processed`
    pub location: &'static str,
}

/// Find `name` in the uploads folder, then in the processed folder
pub fn locate(config: &ServerConfig, name: &str) -> Result<LocatedFile> {
    validate_plain_filename(name)?;
    let kind = FileKind::from_name(name)?;

    for (dir, location) in [
        (config.uploads_dir(), "uploads"),
        (config.processed_dir(), "processed"),
    ] {
        let path = dir.join(name);
        if path.is_file() {
            return Ok(LocatedFile {
                name: name.to_string(),
                path,
                kind,
                location,
            });
        }
    }

    Err(Error::NotFound(format!("File not found: {}", name)))
}

/// Sheet names in workbook order; CSV files have exactly one
pub fn sheet_names(file: &LocatedFile) -> Result<Vec<String>> {
    match file.kind {
        FileKind::Csv => Ok(vec![CSV_SHEET_NAME.to_string()]),
        FileKind::Workbook => {
            let workbook = open_workbook_auto(&file.path).map_err(|e| workbook_error(&file.path, e))?;
            Ok(workbook.sheet_names().to_owned())
        }
    }
}

/// Read one sheet (the first when `sheet` is `None`)
pub fn read_sheet(file: &LocatedFile, sheet: Option<&str>) -> Result<CellGrid> {
    match file.kind {
        FileKind::Csv => {
            if let Some(name) = sheet {
                if name != CSV_SHEET_NAME {
                    return Err(Error::NotFound(format!("Sheet not found: {}", name)));
                }
            }
            read_csv(&file.path)
        }
        FileKind::Workbook => {
            let mut workbook =
                open_workbook_auto(&file.path).map_err(|e| workbook_error(&file.path, e))?;
            let names = workbook.sheet_names().to_owned();
            let target = match sheet {
                Some(name) => names
                    .iter()
                    .find(|n| n.as_str() == name)
                    .cloned()
                    .ok_or_else(|| Error::NotFound(format!("Sheet not found: {}", name)))?,
                None => names
                    .first()
                    .cloned()
                    .ok_or_else(|| Error::InvalidInput("Workbook has no sheets".to_string()))?,
            };
            let range = workbook
                .worksheet_range(&target)
                .map_err(|e| workbook_error(&file.path, e))?;
            Ok(grid_from_rows(
                range.rows().map(|row| row.iter().map(cell_to_json).collect::<Vec<Value>>()),
            ))
        }
    }
}

/// Read every sheet, in workbook order
pub fn read_all_sheets(file: &LocatedFile) -> Result<Vec<(String, CellGrid)>> {
    match file.kind {
        FileKind::Csv => Ok(vec![(CSV_SHEET_NAME.to_string(), read_csv(&file.path)?)]),
        FileKind::Workbook => {
            let mut workbook =
                open_workbook_auto(&file.path).map_err(|e| workbook_error(&file.path, e))?;
            let names = workbook.sheet_names().to_owned();
            let mut sheets = Vec::with_capacity(names.len());
            for name in names {
                let range = workbook
                    .worksheet_range(&name)
                    .map_err(|e| workbook_error(&file.path, e))?;
                let grid =
                    grid_from_rows(range.rows().map(|row| row.iter().map(cell_to_json).collect::<Vec<Value>>()));
                sheets.push((name, grid));
            }
            Ok(sheets)
        }
    }
}

pub fn sheet_info(name: &str, grid: &CellGrid) -> SheetInfo {
    SheetInfo {
        sheet_name: name.to_string(),
        row_count: grid.rows.len(),
        column_count: grid.headers.len(),
        columns: grid.headers.clone(),
        is_empty: grid.headers.is_empty(),
    }
}

/// Size, timestamps and dimensions of a located file (first sheet dimensions)
pub fn file_info(file: &LocatedFile) -> Result<FileInfo> {
    let metadata = std::fs::metadata(&file.path)?;
    let modified_at = metadata.modified().ok().map(DateTime::<Utc>::from);
    let sheets = read_all_sheets(file)?;
    let (row_count, column_count) = sheets
        .first()
        .map(|(_, grid)| (grid.rows.len(), grid.headers.len()))
        .unwrap_or((0, 0));

    Ok(FileInfo {
        file_name: file.name.clone(),
        size: metadata.len(),
        extension: split_extension(&file.name).1.unwrap_or_default(),
        modified_at,
        location: file.location.to_string(),
        sheet_count: sheets.len(),
        row_count,
        column_count,
    })
}

/// Locate and read one sheet on the blocking pool
pub async fn load_sheet(
    config: &ServerConfig,
    name: &str,
    sheet: Option<String>,
) -> Result<(LocatedFile, CellGrid)> {
    let file = locate(config, name)?;
    tokio::task::spawn_blocking(move || {
        let grid = read_sheet(&file, sheet.as_deref())?;
        Ok((file, grid))
    })
    .await
    .map_err(|e| Error::Internal(format!("Sheet read task failed: {}", e)))?
}

/// Run any reader function against a located file on the blocking pool
pub async fn with_file<T, F>(config: &ServerConfig, name: &str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&LocatedFile) -> Result<T> + Send + 'static,
{
    let file = locate(config, name)?;
    tokio::task::spawn_blocking(move || f(&file))
        .await
        .map_err(|e| Error::Internal(format!("File read task failed: {}", e)))?
}

fn read_csv(path: &Path) -> Result<CellGrid> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::InvalidInput(format!("Failed to read CSV {}: {}", path.display(), e)))?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| Error::InvalidInput(format!("Malformed CSV at record {}: {}", i + 1, e)))?;
        let row: Vec<Value> = record
            .iter()
            .enumerate()
            .map(|(col, field)| {
                // Strip a UTF-8 BOM from the very first field
                if i == 0 && col == 0 {
                    csv_field_to_json(field.trim_start_matches('\u{feff}'))
                } else {
                    csv_field_to_json(field)
                }
            })
            .collect();
        rows.push(row);
    }

    Ok(grid_from_rows(rows.into_iter()))
}

/// Build a grid: the first non-empty row is the header, fully empty rows are dropped.
///
/// Data rows wider than the header get `Column_<n>` headers for the extra cells.
pub(crate) fn grid_from_rows(rows: impl Iterator<Item = Vec<Value>>) -> CellGrid {
    let mut rows = rows.filter(|row| row.iter().any(|v| !v.is_null()));

    let header_row = match rows.next() {
        Some(row) => row,
        None => return CellGrid::default(),
    };
    let mut data: Vec<Vec<Value>> = rows.collect();

    // Trailing empty cells never widen the grid
    let used_width = |row: &Vec<Value>| row.iter().rposition(|v| !v.is_null()).map_or(0, |i| i + 1);
    let width = data
        .iter()
        .map(used_width)
        .chain(std::iter::once(header_row.len()))
        .max()
        .unwrap_or(0);
    if width > header_row.len() {
        debug!(
            headers = header_row.len(),
            width, "Data rows wider than header; naming extra columns"
        );
    }

    let mut seen = HashSet::new();
    let headers: Vec<String> = (0..width)
        .map(|i| {
            let base = match header_row.get(i) {
                None | Some(Value::Null) => format!("Column_{}", i + 1),
                Some(Value::String(s)) if s.trim().is_empty() => format!("Column_{}", i + 1),
                Some(Value::String(s)) => s.trim().to_string(),
                Some(other) => other.to_string(),
            };
            // Duplicate headers get a numeric suffix so row objects keep every column
            let mut name = base.clone();
            let mut n = 2;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            name
        })
        .collect();

    for row in &mut data {
        row.resize(width, Value::Null);
    }

    CellGrid {
        headers,
        rows: data,
    }
}

pub(crate) fn cell_to_json(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => json!(i),
        Data::Float(f) => float_to_json(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::Error(e) => Value::String(format!("#{:?}", e)),
        Data::DateTime(dt) if dt.is_datetime() => match dt.as_datetime() {
            Some(at) => Value::String(format_excel_datetime(at)),
            None => float_to_json(dt.as_f64()),
        },
        // Durations stay numeric (fractional days)
        Data::DateTime(dt) => float_to_json(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
    }
}

/// Date-only cells render as `YYYY-MM-DD`, others as `YYYY-MM-DDTHH:MM:SS`
fn format_excel_datetime(at: NaiveDateTime) -> String {
    if at.time() == NaiveTime::MIN {
        at.format("%Y-%m-%d").to_string()
    } else {
        at.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

fn csv_field_to_json(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return json!(i);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => float_to_json(f),
        _ => Value::String(field.to_string()),
    }
}

/// Integral floats render as integers (Excel stores every number as f64)
fn float_to_json(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        json!(f as i64)
    } else {
        json!(f)
    }
}

/// Numeric view of a cell, accepting numeric strings
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Display form of a cell for samples and distinct counts
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn workbook_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::InvalidInput(format!("Failed to read workbook {}: {}", path.display(), err))
}
