//! Credit-risk dataset ingest, exploratory profiling and enriched export.

pub mod loader;
pub mod profile;
pub mod writer;

use std::path::PathBuf;

use thiserror::Error;

pub use loader::{load_records, read_records, LoadedDataset, RowError};
pub use profile::{profile, ColumnKind, ColumnProfile, DatasetProfile, NumericSummary};
pub use writer::write_enriched;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("dataset '{0}' has no usable rows")]
    Empty(PathBuf),
}

/// Normalise a header for lookup: trimmed, lowercase, underscores as spaces.
/// `Credit amount`, `credit_amount` and `CREDIT AMOUNT` all resolve alike.
pub(crate) fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().replace('_', " ")
}
