use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use super::DatasetError;

const PREVIEW_ROWS: usize = 10;
/// Columns with at most this many distinct values are target candidates.
const TARGET_MAX_UNIQUE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    /// Every value is missing.
    Empty,
}

#[derive(Debug, Clone, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1).
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    pub missing: usize,
    pub missing_pct: f64,
    pub unique: usize,
    pub numeric: Option<NumericSummary>,
    /// Distinct values, recorded only for low-cardinality columns.
    pub distinct_values: Option<Vec<String>>,
}

impl ColumnProfile {
    pub fn is_target_candidate(&self) -> bool {
        self.unique > 0 && self.unique <= TARGET_MAX_UNIQUE
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetProfile {
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
    pub preview: Vec<Vec<String>>,
}

impl DatasetProfile {
    pub fn target_candidates(&self) -> impl Iterator<Item = &ColumnProfile> {
        self.columns.iter().filter(|c| c.is_target_candidate())
    }
}

/// Profile a CSV file column by column. Works on raw strings, so it does not
/// require the credit-risk schema.
pub fn profile(path: &Path) -> Result<DatasetProfile, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    profile_reader(file)
}

pub fn profile_reader<R: Read>(reader: R) -> Result<DatasetProfile, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let names: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if h.is_empty() {
                format!("Unnamed: {i}")
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
    let mut preview = Vec::new();
    let mut rows = 0;

    for row in reader.records() {
        let row = row?;
        rows += 1;
        if preview.len() < PREVIEW_ROWS {
            preview.push(row.iter().map(str::to_string).collect());
        }
        for (i, column) in cells.iter_mut().enumerate() {
            let value = row.get(i).filter(|v| !is_missing(v)).map(str::to_string);
            column.push(value);
        }
    }

    let columns = names
        .into_iter()
        .zip(cells)
        .map(|(name, values)| profile_column(name, &values))
        .collect();

    Ok(DatasetProfile {
        rows,
        columns,
        preview,
    })
}

fn is_missing(v: &str) -> bool {
    v.is_empty() || v.eq_ignore_ascii_case("nan") || v.eq_ignore_ascii_case("na")
}

fn profile_column(name: String, values: &[Option<String>]) -> ColumnProfile {
    let present: Vec<&str> = values.iter().flatten().map(String::as_str).collect();
    let missing = values.len() - present.len();
    let missing_pct = if values.is_empty() {
        0.0
    } else {
        round2(missing as f64 / values.len() as f64 * 100.0)
    };

    let distinct: BTreeSet<&str> = present.iter().copied().collect();

    let kind = if present.is_empty() {
        ColumnKind::Empty
    } else if present.iter().all(|v| v.parse::<i64>().is_ok()) {
        ColumnKind::Integer
    } else if present.iter().all(|v| v.parse::<f64>().is_ok()) {
        ColumnKind::Float
    } else {
        ColumnKind::Text
    };

    let numeric = match kind {
        ColumnKind::Integer | ColumnKind::Float => {
            let nums: Vec<f64> = present.iter().filter_map(|v| v.parse().ok()).collect();
            summarize(&nums)
        }
        _ => None,
    };

    let distinct_values = (distinct.len() <= TARGET_MAX_UNIQUE)
        .then(|| distinct.iter().map(|s| s.to_string()).collect());

    ColumnProfile {
        name,
        kind,
        missing,
        missing_pct,
        unique: distinct.len(),
        numeric,
        distinct_values,
    }
}

fn summarize(values: &[f64]) -> Option<NumericSummary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let std = if sorted.len() > 1 {
        (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        f64::NAN
    };

    Some(NumericSummary {
        count: sorted.len(),
        mean,
        std,
        min: sorted[0],
        q25: quantile(&sorted, 0.25),
        q50: quantile(&sorted, 0.50),
        q75: quantile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    })
}

/// Quantile of an ascending slice with linear interpolation between the two
/// nearest ranks. Returns NaN for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Human-readable exploratory report.
pub fn render_report(profile: &DatasetProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "DATASET OVERVIEW");
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out, "Rows: {}", profile.rows);
    let _ = writeln!(out, "Columns: {}", profile.columns.len());
    for (i, c) in profile.columns.iter().enumerate() {
        let _ = writeln!(out, "{:2}. {}", i + 1, c.name);
    }

    let _ = writeln!(out, "\nDATA TYPES AND MISSING VALUES");
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(
        out,
        "{:<20} {:<8} {:>8} {:>9} {:>8}",
        "column", "type", "missing", "missing%", "unique"
    );
    for c in &profile.columns {
        let kind = match c.kind {
            ColumnKind::Integer => "int",
            ColumnKind::Float => "float",
            ColumnKind::Text => "text",
            ColumnKind::Empty => "empty",
        };
        let _ = writeln!(
            out,
            "{:<20} {:<8} {:>8} {:>9.2} {:>8}",
            c.name, kind, c.missing, c.missing_pct, c.unique
        );
    }

    let _ = writeln!(out, "\nDESCRIPTIVE STATISTICS");
    let _ = writeln!(out, "{}", "=".repeat(50));
    for c in &profile.columns {
        if let Some(s) = &c.numeric {
            let _ = writeln!(
                out,
                "{:<20} count={} mean={:.2} std={:.2} min={:.2} 25%={:.2} 50%={:.2} 75%={:.2} max={:.2}",
                c.name, s.count, s.mean, s.std, s.min, s.q25, s.q50, s.q75, s.max
            );
        }
    }

    let _ = writeln!(out, "\nTARGET VARIABLE CANDIDATES");
    let _ = writeln!(out, "{}", "=".repeat(50));
    for c in profile.target_candidates() {
        let values = c.distinct_values.as_deref().unwrap_or_default().join(", ");
        let _ = writeln!(out, "{}: {} unique values -> [{}]", c.name, c.unique, values);
    }

    let _ = writeln!(out, "\nFIRST {} ROWS", profile.preview.len());
    let _ = writeln!(out, "{}", "=".repeat(50));
    for row in &profile.preview {
        let _ = writeln!(out, "{}", row.join(" | "));
    }
    out
}
