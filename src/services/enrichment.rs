use std::time::Duration;

use crate::bedrock::{self, RiskLabeler};
use crate::models::{CreditRecord, Enrichment};

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub batch_size: usize,
    /// Pause after each record to stay under the provider's rate limit.
    pub pace: Duration,
    pub limit: Option<usize>,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            pace: Duration::from_secs(1),
            limit: None,
        }
    }
}

/// Label records with the generative model, batch by batch.
///
/// Output keeps input order, one row per processed record. Labeler errors
/// never drop a record: a failed description is replaced by its error text
/// and still classified, and a failed classification becomes `unknown`.
pub async fn enrich(
    records: &[CreditRecord],
    labeler: &dyn RiskLabeler,
    options: &EnrichOptions,
) -> Vec<(CreditRecord, Enrichment)> {
    let records = match options.limit {
        Some(limit) => &records[..limit.min(records.len())],
        None => records,
    };
    let batch_size = options.batch_size.max(1);
    let n_batches = records.len().div_ceil(batch_size);

    tracing::info!(records = records.len(), batch_size, "Starting enrichment");

    let mut out = Vec::with_capacity(records.len());
    for (batch_idx, batch) in records.chunks(batch_size).enumerate() {
        tracing::info!(batch = batch_idx + 1, of = n_batches, "Processing batch");

        for record in batch {
            let description = bedrock::generate_description(labeler, &record.applicant).await;
            let assessment = bedrock::classify(labeler, &record.applicant, &description).await;
            if !assessment.prediction.is_decided() {
                tracing::warn!(
                    line = record.line,
                    reasoning = %assessment.reasoning,
                    "Record left undecided"
                );
            }
            out.push((
                record.clone(),
                Enrichment {
                    description,
                    prediction: assessment.prediction,
                    confidence: assessment.confidence,
                    reasoning: assessment.reasoning,
                },
            ));

            if !options.pace.is_zero() {
                tokio::time::sleep(options.pace).await;
            }
        }
    }

    let undecided = out
        .iter()
        .filter(|(_, e)| !e.prediction.is_decided())
        .count();
    tracing::info!(processed = out.len(), undecided, "Enrichment finished");
    out
}
