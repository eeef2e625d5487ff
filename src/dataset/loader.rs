use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use super::{normalize_header, DatasetError};
use crate::models::{CreditRecord, CreditRequest, Enrichment, RiskLabel};

const REQUIRED_COLUMNS: &[&str] = &[
    "age",
    "sex",
    "job",
    "housing",
    "credit amount",
    "duration",
    "purpose",
];

/// A row that could not be turned into a [`CreditRecord`].
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    /// Header row as it appears in the file.
    pub headers: Vec<String>,
    pub records: Vec<CreditRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub has_risk_column: bool,
    pub has_enrichment: bool,
}

impl LoadedDataset {
    pub fn rows_used(&self) -> usize {
        self.records.len()
    }
}

/// Load credit records from a CSV file. Rows that fail to parse are skipped
/// and reported in `row_errors`; missing required columns fail the load.
pub fn load_records(path: &Path) -> Result<LoadedDataset, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = read_records(file)?;

    if dataset.records.is_empty() {
        return Err(DatasetError::Empty(path.to_path_buf()));
    }

    tracing::info!(
        path = %path.display(),
        rows_read = dataset.rows_read,
        rows_used = dataset.rows_used(),
        row_errors = dataset.row_errors.len(),
        "Dataset loaded"
    );

    Ok(dataset)
}

/// Parse records from any CSV reader.
pub fn read_records<R: Read>(reader: R) -> Result<LoadedDataset, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let columns = build_header_map(&headers);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !columns.contains_key(**c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DatasetError::MissingColumns(missing));
    }

    let has_risk_column = columns.contains_key("risk");
    let has_enrichment = columns.contains_key("bedrock prediction");

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0;

    for (idx, row) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let row = match row {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: e.to_string(),
                });
                continue;
            }
        };

        match parse_row(&row, &columns, line) {
            Ok(record) => records.push(record),
            Err(message) => {
                tracing::debug!(line, error = %message, "Skipping dataset row");
                row_errors.push(RowError { line, message });
            }
        }
    }

    Ok(LoadedDataset {
        headers: headers.iter().map(str::to_string).collect(),
        records,
        row_errors,
        rows_read,
        has_risk_column,
        has_enrichment,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (i, h) in headers.iter().enumerate() {
        let key = normalize_header(h);
        // Unnamed leading index column.
        if key.is_empty() {
            continue;
        }
        map.entry(key).or_insert(i);
    }
    map
}

fn field<'a>(row: &'a StringRecord, columns: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    columns
        .get(name)
        .and_then(|&i| row.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("nan") && !s.eq_ignore_ascii_case("na"))
}

fn required<'a>(
    row: &'a StringRecord,
    columns: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    field(row, columns, name).ok_or_else(|| format!("missing value for '{name}'"))
}

fn parse_whole(raw: &str, name: &str) -> Result<u32, String> {
    if let Ok(v) = raw.parse::<u32>() {
        return Ok(v);
    }
    // Spreadsheet exports write integers as "35.0".
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => {
            Ok(v as u32)
        }
        _ => Err(format!("invalid integer for '{name}': '{raw}'")),
    }
}

fn parse_row(
    row: &StringRecord,
    columns: &HashMap<String, usize>,
    line: usize,
) -> Result<CreditRecord, String> {
    let age = parse_whole(required(row, columns, "age")?, "age")?;
    let job_raw = parse_whole(required(row, columns, "job")?, "job")?;
    let job = u8::try_from(job_raw).map_err(|_| format!("job code out of range: {job_raw}"))?;
    let duration = parse_whole(required(row, columns, "duration")?, "duration")?;

    let amount_raw = required(row, columns, "credit amount")?;
    let credit_amount: f64 = amount_raw
        .parse()
        .map_err(|_| format!("invalid number for 'credit amount': '{amount_raw}'"))?;

    let applicant = CreditRequest {
        age,
        sex: required(row, columns, "sex")?.to_string(),
        job,
        housing: required(row, columns, "housing")?.to_string(),
        saving_accounts: field(row, columns, "saving accounts").map(str::to_string),
        checking_account: field(row, columns, "checking account").map(str::to_string),
        credit_amount,
        duration,
        purpose: required(row, columns, "purpose")?.to_string(),
    };
    applicant.validate()?;

    let risk = match field(row, columns, "risk") {
        Some(raw) => Some(raw.parse::<RiskLabel>()?),
        None => None,
    };

    let enrichment = match field(row, columns, "bedrock prediction") {
        Some(raw) => Some(Enrichment {
            description: field(row, columns, "bedrock description")
                .unwrap_or_default()
                .to_string(),
            prediction: raw.parse().unwrap_or(RiskLabel::Unknown),
            confidence: field(row, columns, "bedrock confidence")
                .and_then(|c| c.parse::<f64>().ok())
                .filter(|c| c.is_finite())
                .unwrap_or(0.0),
            reasoning: field(row, columns, "bedrock reasoning")
                .unwrap_or_default()
                .to_string(),
        }),
        None => None,
    };

    Ok(CreditRecord {
        line,
        applicant,
        risk,
        enrichment,
        raw: row.iter().map(str::to_string).collect(),
    })
}
