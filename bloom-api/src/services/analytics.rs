//! Descriptive statistics for the non-MMM dashboard

use crate::models::CellGrid;
use crate::services::file_reader::value_as_f64;
use bloom_common::{Error, Result};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSummary {
    pub column: String,
    /// Numeric values
    pub count: usize,
    /// Rows without a numeric value
    pub missing: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; 0 for a single value
    pub std_dev: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trendline {
    pub x_column: String,
    pub y_column: String,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub points: usize,
    /// Line evaluated at the smallest x
    pub start: Point,
    /// Line evaluated at the largest x
    pub end: Point,
}

/// A column counts as numeric when at least half of its non-empty cells parse
fn numeric_values<'a>(values: impl Iterator<Item = &'a Value>) -> Option<(Vec<f64>, usize)> {
    let mut numbers = Vec::new();
    let mut non_null = 0;
    let mut total = 0;
    for value in values {
        total += 1;
        if value.is_null() || value.as_str().map_or(false, |s| s.trim().is_empty()) {
            continue;
        }
        non_null += 1;
        if let Some(n) = value_as_f64(value) {
            numbers.push(n);
        }
    }
    if numbers.is_empty() || numbers.len() * 2 < non_null {
        return None;
    }
    let missing = total - numbers.len();
    Some((numbers, missing))
}

fn summarize(column: &str, numbers: &[f64], missing: usize) -> ColumnSummary {
    let count = numbers.len();
    let mean = numbers.iter().sum::<f64>() / count as f64;
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let std_dev = if count > 1 {
        let variance = numbers.iter().map(|n| (n - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };

    ColumnSummary {
        column: column.to_string(),
        count,
        missing,
        mean,
        min,
        max,
        std_dev,
    }
}

/// Summaries for every numeric column, in column order
pub fn column_summaries(grid: &CellGrid) -> Vec<ColumnSummary> {
    grid.headers
        .iter()
        .enumerate()
        .filter_map(|(idx, header)| {
            let (numbers, missing) = numeric_values(grid.column_values(idx))?;
            Some(summarize(header, &numbers, missing))
        })
        .collect()
}

/// Ordinary least squares fit of `y` on `x` over rows where both are numeric
pub fn trendline(grid: &CellGrid, x_column: &str, y_column: &str) -> Result<Trendline> {
    let column = |name: &str| {
        grid.column_index(name)
            .ok_or_else(|| Error::InvalidInput(format!("Column not found: {}", name)))
    };
    let x_idx = column(x_column)?;
    let y_idx = column(y_column)?;

    let points: Vec<Point> = grid
        .rows
        .iter()
        .filter_map(|row| {
            let x = row.get(x_idx).and_then(value_as_f64)?;
            let y = row.get(y_idx).and_then(value_as_f64)?;
            Some(Point { x, y })
        })
        .collect();

    if points.len() < 2 {
        return Err(Error::InvalidInput(format!(
            "Need at least 2 numeric points for a trendline, found {}",
            points.len()
        )));
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.x - mean_x).powi(2)).sum();
    let sxy: f64 = points.iter().map(|p| (p.x - mean_x) * (p.y - mean_y)).sum();
    let syy: f64 = points.iter().map(|p| (p.y - mean_y).powi(2)).sum();

    if sxx == 0.0 {
        return Err(Error::InvalidInput(format!(
            "Column {} has no variance; cannot fit a trendline",
            x_column
        )));
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    // A flat y is fitted exactly by a flat line
    let r_squared = if syy == 0.0 { 1.0 } else { (sxy * sxy) / (sxx * syy) };

    let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);

    Ok(Trendline {
        x_column: x_column.to_string(),
        y_column: y_column.to_string(),
        slope,
        intercept,
        r_squared,
        points: points.len(),
        start: Point { x: min_x, y: slope * min_x + intercept },
        end: Point { x: max_x, y: slope * max_x + intercept },
    })
}
