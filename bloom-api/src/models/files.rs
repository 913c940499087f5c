//! Uploaded file descriptions and parsed sheet contents

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// A parsed sheet: header row plus data rows, cells as JSON values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl CellGrid {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// First `limit` data rows as `{header: value}` objects
    pub fn row_objects(&self, limit: usize) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                self.headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (h.clone(), row.get(i).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect()
    }

    /// Values of one column; short rows yield `Null`
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).unwrap_or(&Value::Null))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetInfo {
    pub sheet_name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub is_empty: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub file_name: String,
    pub size: u64,
    pub extension: String,
    pub modified_at: Option<DateTime<Utc>>,
    /// `uploads` or `processed`
    pub location: String,
    pub sheet_count: usize,
    pub row_count: usize,
    pub column_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub original_name: String,
    pub stored_name: String,
    pub size: u64,
    pub extension: String,
    pub uploaded_at: DateTime<Utc>,
    pub columns: Vec<String>,
    pub sheets: Vec<SheetInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_objects_pads_short_rows() {
        let grid = CellGrid {
            headers: vec!["A".into(), "B".into()],
            rows: vec![vec![json!(1)], vec![json!(2), json!("x")]],
        };
        let objects = grid.row_objects(10);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0]["B"], Value::Null);
        assert_eq!(objects[1]["B"], "x");
    }

    #[test]
    fn test_column_values() {
        let grid = CellGrid {
            headers: vec!["A".into(), "B".into()],
            rows: vec![vec![json!(1), json!(2)], vec![json!(3)]],
        };
        let values: Vec<&Value> = grid.column_values(1).collect();
        assert_eq!(values, vec![&json!(2), &Value::Null]);
        assert_eq!(grid.column_index("B"), Some(1));
        assert_eq!(grid.column_index("C"), None);
    }
}
