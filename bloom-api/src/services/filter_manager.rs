//! Filter column suggestion, validation and persistence
//!
//! Suggestions come from a static priority table of column-name patterns.
//! Names are split into lowercase tokens (`"Sub_Region Name"` becomes
//! `["sub", "region", "name"]`) and a pattern matches a token exactly or with
//! a trailing plural `s`.

use crate::models::{
    AvailableColumn, CellGrid, FilterState, FilterSuggestion, SuggestionPriority, ValidationResult,
};
use crate::services::file_reader::{self, value_as_f64, value_as_text};
use crate::services::metadata_manager::MetadataManager;
use bloom_common::config::ServerConfig;
use bloom_common::naming::document_key;
use bloom_common::{Error, JsonStore, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

/// Beyond this many filters the selection is still valid but gets a warning
pub const MAX_RECOMMENDED_FILTERS: usize = 10;

/// Rows scanned when classifying columns for `available`
const AVAILABLE_SCAN_ROWS: usize = 1000;

/// Sample values reported per available column
const MAX_SAMPLE_VALUES: usize = 10;

const PRIORITY_TABLE: &[(SuggestionPriority, &[&str])] = &[
    (
        SuggestionPriority::High,
        &[
            "region", "channel", "market", "brand", "category", "segment", "product",
            "territory", "zone", "country",
        ],
    ),
    (
        SuggestionPriority::Medium,
        &[
            "type", "group", "class", "format", "size", "variant", "pack", "subcategory",
            "manufacturer", "retailer", "tier", "cluster",
        ],
    ),
    (
        SuggestionPriority::Low,
        &[
            "city", "state", "store", "outlet", "area", "district", "town", "location",
            "flavor", "flavour",
        ],
    ),
];

/// Metric and time columns are never filter candidates
const EXCLUDED_PATTERNS: &[&str] = &[
    "volume", "sales", "value", "revenue", "price", "spend", "cost", "grp", "grps",
    "impression", "impressions", "reach", "share", "distribution", "units", "amount", "rpi",
    "date", "month", "week", "year", "period", "time", "day", "quarter",
];

/// Target variable candidates with their weight (higher is better)
const TARGET_PATTERNS: &[(&str, u8)] = &[
    ("volume", 3),
    ("sales", 3),
    ("units", 2),
    ("value", 2),
    ("revenue", 2),
    ("share", 1),
];

/// Target variables are outcomes; these mark inputs instead
const TARGET_EXCLUDED: &[&str] = &["price", "rpi", "distribution", "spend", "cost"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSuggestion {
    pub column: String,
    pub score: u8,
    pub matched_pattern: String,
}

fn tokens(column: &str) -> Vec<String> {
    column
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn token_matches(token: &str, pattern: &str) -> bool {
    token == pattern || token.strip_suffix('s') == Some(pattern)
}

fn find_pattern<'a>(tokens: &[String], patterns: &[&'a str]) -> Option<&'a str> {
    patterns
        .iter()
        .find(|p| tokens.iter().any(|t| token_matches(t, p)))
        .copied()
}

/// Rank filter candidates: priority first, then original column order
pub fn suggest(columns: &[String]) -> Vec<FilterSuggestion> {
    let mut ranked: Vec<(SuggestionPriority, usize, FilterSuggestion)> = Vec::new();

    for (idx, column) in columns.iter().enumerate() {
        let toks = tokens(column);
        if find_pattern(&toks, EXCLUDED_PATTERNS).is_some() {
            continue;
        }
        for (priority, patterns) in PRIORITY_TABLE {
            if let Some(pattern) = find_pattern(&toks, patterns) {
                ranked.push((
                    *priority,
                    idx,
                    FilterSuggestion {
                        column: column.clone(),
                        priority: *priority,
                        matched_pattern: pattern.to_string(),
                        reason: format!("Column name matches '{}' dimension", pattern),
                    },
                ));
                break;
            }
        }
    }

    ranked.sort_by_key(|(priority, idx, _)| (*priority, *idx));
    ranked.into_iter().map(|(_, _, s)| s).collect()
}

/// Rank target variable candidates: highest weight first, then column order
pub fn suggest_targets(columns: &[String]) -> Vec<TargetSuggestion> {
    let mut out: Vec<(usize, TargetSuggestion)> = columns
        .iter()
        .enumerate()
        .filter_map(|(idx, column)| {
            let toks = tokens(column);
            if find_pattern(&toks, TARGET_EXCLUDED).is_some() {
                return None;
            }
            TARGET_PATTERNS
                .iter()
                .find(|(p, _)| toks.iter().any(|t| token_matches(t, p)))
                .map(|(p, score)| {
                    (
                        idx,
                        TargetSuggestion {
                            column: column.clone(),
                            score: *score,
                            matched_pattern: p.to_string(),
                        },
                    )
                })
        })
        .collect();

    out.sort_by(|a, b| b.1.score.cmp(&a.1.score).then(a.0.cmp(&b.0)));
    out.into_iter().map(|(_, s)| s).collect()
}

/// Check a filter selection against the columns actually present
pub fn validate(selected: &[String], available: &[String]) -> ValidationResult {
    let mut result = ValidationResult {
        is_valid: true,
        ..Default::default()
    };

    if selected.is_empty() {
        result.warnings.push("No filters selected".to_string());
    }

    let available: HashSet<&str> = available.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();

    for (i, name) in selected.iter().enumerate() {
        if name.trim().is_empty() {
            result.errors.push(format!("Filter at position {} is empty", i + 1));
            continue;
        }
        if !available.contains(name.as_str()) {
            result
                .errors
                .push(format!("Column '{}' is not available in the data", name));
        }
        if !seen.insert(name.as_str()) {
            result
                .errors
                .push(format!("Duplicate filter selection: '{}'", name));
        }
    }

    if selected.len() > MAX_RECOMMENDED_FILTERS {
        result.warnings.push(format!(
            "{} filters selected; more than {} may slow down analysis",
            selected.len(),
            MAX_RECOMMENDED_FILTERS
        ));
    }

    result.is_valid = result.errors.is_empty();
    result
}

/// Categorical columns (mostly non-numeric) with distinct counts and samples
pub fn available_columns(grid: &CellGrid) -> Vec<AvailableColumn> {
    let mut out = Vec::new();

    for (idx, header) in grid.headers.iter().enumerate() {
        let mut non_null = 0usize;
        let mut numeric = 0usize;
        let mut distinct = HashSet::new();
        let mut samples = Vec::new();

        for value in grid.column_values(idx).take(AVAILABLE_SCAN_ROWS) {
            let Some(text) = value_as_text(value) else {
                continue;
            };
            non_null += 1;
            if value_as_f64(value).is_some() {
                numeric += 1;
            }
            if distinct.insert(text.clone()) && samples.len() < MAX_SAMPLE_VALUES {
                samples.push(text);
            }
        }

        if non_null == 0 || numeric * 2 >= non_null {
            continue;
        }

        out.push(AvailableColumn {
            column: header.clone(),
            unique_values: distinct.len(),
            sample_values: samples,
        });
    }

    out
}

/// Outcome of a save: the persisted state and whether a metadata workbook was updated
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFilters {
    pub state: FilterState,
    pub validation: ValidationResult,
    pub metadata_file: Option<String>,
}

/// Validate against the file's columns, persist, and mirror into the metadata workbook
pub async fn save_filters(
    config: &ServerConfig,
    store: &JsonStore,
    metadata: &MetadataManager,
    file_name: &str,
    sheet: Option<String>,
    selected: Vec<String>,
) -> Result<SavedFilters> {
    let (_, grid) = file_reader::load_sheet(config, file_name, sheet.clone()).await?;
    let validation = validate(&selected, &grid.headers);
    if !validation.is_valid {
        return Err(Error::InvalidInput(format!(
            "Invalid filter selection: {}",
            validation.errors.join("; ")
        )));
    }

    let state = FilterState {
        file_name: file_name.to_string(),
        selected_filters: selected,
        sheet,
        saved_at: Utc::now(),
        schema_version: crate::models::SCHEMA_VERSION.to_string(),
    };
    store.write(&document_key(file_name), &state).await?;

    let metadata_file = match metadata.find_for_file(file_name).await? {
        Some(workbook_name) => {
            metadata
                .set_filters(&workbook_name, state.selected_filters.clone())
                .await?;
            Some(workbook_name)
        }
        None => None,
    };

    info!(
        file = %file_name,
        filters = state.selected_filters.len(),
        metadata_updated = metadata_file.is_some(),
        "Saved filter selection"
    );

    Ok(SavedFilters {
        state,
        validation,
        metadata_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_suggest_orders_by_priority_then_position() {
        let columns = cols(&["City", "Pack Type", "Region", "Volume Acme", "Channel", "Month"]);
        let suggestions = suggest(&columns);
        let names: Vec<&str> = suggestions.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(names, vec!["Region", "Channel", "Pack Type", "City"]);
        assert_eq!(suggestions[0].priority, SuggestionPriority::High);
        assert_eq!(suggestions[2].matched_pattern, "type");
        assert_eq!(suggestions[3].priority, SuggestionPriority::Low);
    }

    #[test]
    fn test_suggest_excludes_metrics_and_plural_match() {
        let columns = cols(&["Brand Sales", "Regions", "statement_id"]);
        let suggestions = suggest(&columns);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].column, "Regions");
    }

    #[test]
    fn test_suggest_targets() {
        let columns = cols(&["Date", "Price Acme", "Value Sales", "Units", "Volume_Acme"]);
        let targets = suggest_targets(&columns);
        let names: Vec<&str> = targets.iter().map(|t| t.column.as_str()).collect();
        assert_eq!(names, vec!["Value Sales", "Volume_Acme", "Units"]);
        assert_eq!(targets[0].score, 3);
    }

    #[test]
    fn test_validate_rejects_unknown_and_duplicates() {
        let available = cols(&["Region", "Channel"]);
        let result = validate(&cols(&["Region", "Store", "Region"]), &available);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("Store"));
        assert!(result.errors[1].contains("Duplicate"));
    }

    #[test]
    fn test_validate_accepts_known_columns() {
        let available = cols(&["Region", "Channel"]);
        let result = validate(&cols(&["Channel", "Region"]), &available);
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_empty_selection_warns() {
        let result = validate(&[], &cols(&["Region"]));
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_validate_blank_name() {
        let result = validate(&cols(&["  "]), &cols(&["Region"]));
        assert!(!result.is_valid);
    }

    #[test]
    fn test_validate_many_filters_warns() {
        let names: Vec<String> = (0..12).map(|i| format!("C{}", i)).collect();
        let result = validate(&names, &names);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_available_columns() {
        let grid = CellGrid {
            headers: cols(&["Region", "Sales", "Empty", "Mixed"]),
            rows: vec![
                vec![json!("North"), json!(10), json!(null), json!("a")],
                vec![json!("South"), json!(12), json!(null), json!(1)],
                vec![json!("North"), json!(9), json!(null), json!("b")],
            ],
        };
        let available = available_columns(&grid);
        assert_eq!(available.len(), 2);
        assert_eq!(available[0].column, "Region");
        assert_eq!(available[0].unique_values, 2);
        assert_eq!(available[0].sample_values, vec!["North", "South"]);
        assert_eq!(available[1].column, "Mixed");
    }
}
