use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use super::{normalize_header, DatasetError};
use crate::models::{CreditRecord, Enrichment};

const ENRICHMENT_COLUMNS: &[&str] = &[
    "bedrock_description",
    "bedrock_prediction",
    "bedrock_confidence",
    "bedrock_reasoning",
];

/// Write records with their generative labels: every source column as read,
/// followed by the `bedrock_*` columns. Labels from an earlier enrichment
/// are replaced. The output can be read back by [`super::load_records`] and
/// used as a training set.
pub fn write_enriched(
    path: &Path,
    headers: &[String],
    rows: &[(CreditRecord, Enrichment)],
) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| DatasetError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = File::create(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_enriched_to(file, headers, rows)?;

    tracing::info!(path = %path.display(), rows = rows.len(), "Enriched dataset written");
    Ok(())
}

pub fn write_enriched_to<W: Write>(
    writer: W,
    headers: &[String],
    rows: &[(CreditRecord, Enrichment)],
) -> Result<(), DatasetError> {
    let kept: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !normalize_header(h).starts_with("bedrock "))
        .map(|(i, _)| i)
        .collect();

    let mut w = csv::Writer::from_writer(writer);
    w.write_record(
        kept.iter()
            .map(|&i| headers[i].as_str())
            .chain(ENRICHMENT_COLUMNS.iter().copied()),
    )?;

    for (record, enrichment) in rows {
        let source = kept
            .iter()
            .map(|&i| record.raw.get(i).map(String::as_str).unwrap_or_default());
        let confidence = enrichment.confidence.to_string();
        let prediction = enrichment.prediction.to_string();
        let labels = [
            enrichment.description.as_str(),
            prediction.as_str(),
            confidence.as_str(),
            enrichment.reasoning.as_str(),
        ];
        w.write_record(source.chain(labels))?;
    }

    w.flush().map_err(csv::Error::from)?;
    Ok(())
}
