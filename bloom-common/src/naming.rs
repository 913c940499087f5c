//! Brand and file naming helpers
//!
//! Analysis identifiers are pure functions of the brand name and analysis
//! type, so the same brand always maps to the same record on disk.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum length of a cleaned brand name
pub const MAX_BRAND_NAME_LEN: usize = 100;

/// Kind of analysis a workflow instance runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisType {
    #[serde(rename = "mmm")]
    Mmm,
    #[serde(rename = "non-mmm", alias = "nonmmm", alias = "non_mmm")]
    NonMmm,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Mmm => "mmm",
            AnalysisType::NonMmm => "non-mmm",
        }
    }
}

impl Default for AnalysisType {
    fn default() -> Self {
        AnalysisType::Mmm
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnalysisType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mmm" => Ok(AnalysisType::Mmm),
            "non-mmm" | "nonmmm" | "non_mmm" => Ok(AnalysisType::NonMmm),
            other => Err(Error::InvalidInput(format!("Unknown analysis type: {}", other))),
        }
    }
}

/// Trim, collapse internal whitespace and drop unsupported characters
pub fn clean_brand_name(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | '_' | '&' | '.' | '\''))
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean and validate a brand name, returning the cleaned form
pub fn validate_brand_name(raw: &str) -> Result<String> {
    let cleaned = clean_brand_name(raw);
    if cleaned.is_empty() {
        return Err(Error::InvalidInput("Brand name is required".to_string()));
    }
    if cleaned.chars().count() > MAX_BRAND_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "Brand name must be at most {} characters",
            MAX_BRAND_NAME_LEN
        )));
    }
    Ok(cleaned)
}

/// Lowercase slug: non-alphanumerics become `-`, runs collapse, ends trimmed
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for c in value.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Deterministic analysis identifier, e.g. `acme-co-mmm`
pub fn analysis_id(brand_name: &str, analysis_type: AnalysisType) -> Result<String> {
    let cleaned = validate_brand_name(brand_name)?;
    let slug = slugify(&cleaned);
    if slug.is_empty() {
        return Err(Error::InvalidInput(
            "Brand name must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(format!("{}-{}", slug, analysis_type.as_str()))
}

/// Reject names that could escape the data directory
pub fn validate_plain_filename(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("File name is required".to_string()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(Error::InvalidInput(format!("Invalid file name: {}", name)));
    }
    Ok(())
}

/// Split `name` into `(stem, lowercase extension)`; extension excludes the dot
pub fn split_extension(name: &str) -> (&str, Option<String>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => {
            (&name[..idx], Some(name[idx + 1..].to_ascii_lowercase()))
        }
        _ => (name, None),
    }
}

/// Filesystem-safe stem: unsupported characters become `_`, runs collapse
pub fn sanitize_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        let mapped = if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Stored upload name: `<sanitized-stem>_<YYYYMMDD_HHMMSS_mmm>.<ext>`
pub fn timestamped_filename(original: &str, at: DateTime<Utc>) -> String {
    let (stem, ext) = split_extension(original);
    let stamp = crate::time::filename_stamp(at);
    match ext {
        Some(ext) => format!("{}_{}.{}", sanitize_stem(stem), stamp, ext),
        None => format!("{}_{}", sanitize_stem(stem), stamp),
    }
}

/// Hex digits of the name digest kept in a document key
const KEY_HASH_LEN: usize = 12;

/// Key under which per-file documents are stored.
///
/// `<sanitized stem>_<ext>_<digest>`: the readable prefix is for humans, the
/// SHA-256 prefix of the exact name keeps distinct names on distinct keys.
pub fn document_key(file_name: &str) -> String {
    let (stem, ext) = split_extension(file_name);
    let digest = format!("{:x}", Sha256::digest(file_name.as_bytes()));
    match ext {
        Some(ext) => format!("{}_{}_{}", sanitize_stem(stem), ext, &digest[..KEY_HASH_LEN]),
        None => format!("{}_{}", sanitize_stem(stem), &digest[..KEY_HASH_LEN]),
    }
}

/// Does a stored filename belong to the brand with this slug?
///
/// The slug must match whole leading tokens of the name (split on `_`, `-`,
/// `.` and spaces) and be followed by the upload timestamp or a file suffix,
/// so `acme` does not claim `Acme_Co_...` or `Acmeplus_...`.
pub fn filename_matches_brand(file_name: &str, brand_slug: &str) -> bool {
    let brand: Vec<&str> = brand_slug.split('-').filter(|t| !t.is_empty()).collect();
    if brand.is_empty() {
        return false;
    }
    let lower = file_name.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| matches!(c, '_' | '-' | '.' | ' '))
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.len() <= brand.len() || !tokens.starts_with(&brand) {
        return false;
    }
    tokens[brand.len()]
        .chars()
        .next()
        .map_or(true, |c| c.is_ascii_digit())
        || is_file_suffix(tokens[brand.len()])
}

fn is_file_suffix(token: &str) -> bool {
    matches!(token, "xlsx" | "xls" | "xlsm" | "csv" | "json" | "metadata")
}
