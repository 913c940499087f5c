//! Brand categorization from column names
//!
//! Concatenated MMM datasets name their metric columns `<Metric> <Brand>`
//! (e.g. `Volume Acme`, `Wtd Distribution Globex`) and their relative price
//! columns `RPI <Brand> vs <Competitor>`. Brands are recovered from those
//! names and split into our brand, competitors and halo brands.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Metric prefixes; multi-word ones precede the single words they start with
const METRIC_PREFIXES: &[&str] = &[
    "volume sales",
    "value sales",
    "numeric distribution",
    "wtd distribution",
    "weighted distribution",
    "distribution",
    "promotion",
    "revenue",
    "volume",
    "value",
    "sales",
    "price",
    "promo",
    "share",
    "spend",
    "units",
    "tdp",
    "acv",
];

const RPI_PREFIX: &str = "rpi";
const RPI_SEPARATOR: &str = " vs ";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeRequest {
    /// Columns to inspect; read from `file_name` when absent
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub sheet_name: Option<String>,
    pub client_brand: String,
    #[serde(default)]
    pub halo_brands: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandCategorization {
    /// Client brand as spelled in the columns; `None` when it never appears
    pub our_brand: Option<String>,
    pub competitors: Vec<String>,
    pub halo_brands: Vec<String>,
    pub rpi_columns: Vec<String>,
    pub unmatched_halo_brands: Vec<String>,
    pub all_brands: Vec<String>,
}

fn is_word_separator(c: char) -> bool {
    matches!(c, ' ' | '_' | '-')
}

/// Brand part of a `<Metric> <Brand>` column.
///
/// The longest metric prefix that ends on a word boundary decides; a bare
/// metric (`Value Sales`) or a metric-only remainder (`Sales Volume`) has no brand.
fn metric_brand(column: &str) -> Option<&str> {
    let lower = column.to_ascii_lowercase();
    let prefix = METRIC_PREFIXES.iter().find(|prefix| {
        lower
            .strip_prefix(*prefix)
            .map_or(false, |rest| rest.is_empty() || rest.starts_with(is_word_separator))
    })?;

    let brand = column.get(prefix.len()..)?.trim_matches(is_word_separator);
    if brand.is_empty() || is_metric_name(brand) {
        return None;
    }
    Some(brand)
}

fn is_metric_name(text: &str) -> bool {
    let normalized = text
        .split(is_word_separator)
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    METRIC_PREFIXES.contains(&normalized.as_str())
}

/// Brands named by an `RPI <A> vs <B>` column
fn rpi_brands(column: &str) -> Option<(&str, &str)> {
    let lower = column.to_ascii_lowercase();
    let rest = lower.strip_prefix(RPI_PREFIX)?;
    if !rest.starts_with(|c: char| c == ' ' || c == '_') {
        return None;
    }
    let body = column.get(RPI_PREFIX.len() + 1..)?;
    let sep = body.to_ascii_lowercase().find(RPI_SEPARATOR)?;
    let first = body.get(..sep)?.trim();
    let second = body.get(sep + RPI_SEPARATOR.len()..)?.trim();
    (!first.is_empty() && !second.is_empty()).then_some((first, second))
}

pub fn is_rpi_column(column: &str) -> bool {
    rpi_brands(column).is_some()
}

/// Unique brands in first-seen order (case-insensitive dedup)
pub fn extract_brands(columns: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut brands = Vec::new();
    let mut push = |brand: &str| {
        if seen.insert(brand.to_lowercase()) {
            brands.push(brand.to_string());
        }
    };

    for column in columns {
        let column = column.trim();
        if let Some((first, second)) = rpi_brands(column) {
            push(first);
            push(second);
        } else if let Some(brand) = metric_brand(column) {
            push(brand);
        }
    }
    brands
}

pub fn categorize(columns: &[String], client_brand: &str, halo_brands: &[String]) -> BrandCategorization {
    let all_brands = extract_brands(columns);
    let client_key = client_brand.trim().to_lowercase();
    let halo_keys: HashSet<String> = halo_brands.iter().map(|h| h.trim().to_lowercase()).collect();

    let mut result = BrandCategorization {
        rpi_columns: columns
            .iter()
            .filter(|c| is_rpi_column(c.trim()))
            .cloned()
            .collect(),
        ..Default::default()
    };

    for brand in &all_brands {
        let key = brand.to_lowercase();
        if key == client_key {
            result.our_brand = Some(brand.clone());
        } else if halo_keys.contains(&key) {
            result.halo_brands.push(brand.clone());
        } else {
            result.competitors.push(brand.clone());
        }
    }

    let found: HashSet<String> = all_brands.iter().map(|b| b.to_lowercase()).collect();
    result.unmatched_halo_brands = halo_brands
        .iter()
        .filter(|h| !found.contains(&h.trim().to_lowercase()))
        .cloned()
        .collect();
    result.all_brands = all_brands;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_metric_brand() {
        assert_eq!(metric_brand("Volume Acme"), Some("Acme"));
        assert_eq!(metric_brand("Wtd Distribution Globex Corp"), Some("Globex Corp"));
        assert_eq!(metric_brand("price_initech"), Some("initech"));
        assert_eq!(metric_brand("Volumes"), None);
        assert_eq!(metric_brand("Volume"), None);
        assert_eq!(metric_brand("Region"), None);
    }

    #[test]
    fn test_bare_metrics_have_no_brand() {
        assert_eq!(metric_brand("Value Sales"), None);
        assert_eq!(metric_brand("Volume Sales"), None);
        assert_eq!(metric_brand("Sales Volume"), None);
        assert_eq!(metric_brand("volume_sales"), None);
        assert_eq!(metric_brand("Value Sales Acme"), Some("Acme"));

        let result = categorize(
            &cols(&["Month", "Value Sales", "Volume Sales", "Volume Acme"]),
            "Acme",
            &[],
        );
        assert_eq!(result.all_brands, vec!["Acme"]);
        assert!(result.competitors.is_empty());
    }

    #[test]
    fn test_rpi_brands() {
        assert_eq!(rpi_brands("RPI Acme vs Globex"), Some(("Acme", "Globex")));
        assert_eq!(rpi_brands("rpi_Acme VS Globex"), Some(("Acme", "Globex")));
        assert_eq!(rpi_brands("RPIX Acme vs Globex"), None);
        assert_eq!(rpi_brands("RPI Acme"), None);
    }

    #[test]
    fn test_extract_brands_first_seen_order() {
        let columns = cols(&[
            "Month",
            "Volume Acme",
            "Volume Globex",
            "Price acme",
            "RPI Acme vs Initech",
            "Region",
        ]);
        assert_eq!(extract_brands(&columns), vec!["Acme", "Globex", "Initech"]);
    }

    #[test]
    fn test_categorize() {
        let columns = cols(&[
            "Volume Acme",
            "Volume Globex",
            "Volume Acme Lite",
            "RPI Acme vs Globex",
        ]);
        let halo = cols(&["acme lite", "Hooli"]);
        let result = categorize(&columns, "ACME", &halo);

        assert_eq!(result.our_brand.as_deref(), Some("Acme"));
        assert_eq!(result.competitors, vec!["Globex"]);
        assert_eq!(result.halo_brands, vec!["Acme Lite"]);
        assert_eq!(result.unmatched_halo_brands, vec!["Hooli"]);
        assert_eq!(result.rpi_columns, vec!["RPI Acme vs Globex"]);
    }

    #[test]
    fn test_categorize_missing_client_brand() {
        let result = categorize(&cols(&["Volume Globex"]), "Acme", &[]);
        assert_eq!(result.our_brand, None);
        assert_eq!(result.competitors, vec!["Globex"]);
    }
}
