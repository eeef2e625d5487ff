use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{LabelEncoder, ModelError};
use crate::dataset::profile::quantile;
use crate::models::{CreditRecord, CreditRequest, RiskLabel};

/// Feature columns in model order. Categorical columns are label-encoded.
pub const BASE_FEATURES: [&str; 9] = [
    "age",
    "credit_amount",
    "duration",
    "sex",
    "job",
    "housing",
    "saving_accounts",
    "checking_account",
    "purpose",
];

pub const CATEGORICAL_FEATURES: [&str; 5] =
    ["sex", "housing", "saving_accounts", "checking_account", "purpose"];

/// Optional trailing feature: the generative model's confidence.
pub const LLM_CONFIDENCE_FEATURE: &str = "bedrock_confidence";

/// Where the training labels came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    /// Ground-truth `Risk` column.
    RiskColumn,
    /// Generative labels from an enriched dataset.
    LlmLabel,
    /// Business-rule score on age, amount and duration.
    SyntheticRule,
}

/// Turns applicants into numeric feature vectors. Fitted once on the
/// training data and stored with the model so serving encodes identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    columns: Vec<String>,
    encoders: BTreeMap<String, LabelEncoder>,
}

impl FeatureEncoder {
    pub fn fit(records: &[CreditRecord], include_llm_confidence: bool) -> Self {
        let mut encoders = BTreeMap::new();
        for column in CATEGORICAL_FEATURES {
            let enc = LabelEncoder::fit(
                records
                    .iter()
                    .filter_map(|r| r.applicant.category(column)),
            );
            encoders.insert(column.to_string(), enc);
        }

        let mut columns: Vec<String> = BASE_FEATURES.iter().map(|c| c.to_string()).collect();
        if include_llm_confidence {
            columns.push(LLM_CONFIDENCE_FEATURE.into());
        }

        Self { columns, encoders }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn encoder(&self, column: &str) -> Option<&LabelEncoder> {
        self.encoders.get(column)
    }

    pub fn uses_llm_confidence(&self) -> bool {
        self.columns.iter().any(|c| c == LLM_CONFIDENCE_FEATURE)
    }

    /// Encode one applicant. `llm_confidence` fills the confidence feature
    /// when the model uses it; a missing value encodes as 0.
    pub fn encode(&self, applicant: &CreditRequest, llm_confidence: Option<f64>) -> Vec<f64> {
        self.columns
            .iter()
            .map(|column| match column.as_str() {
                "age" => applicant.age as f64,
                "credit_amount" => applicant.credit_amount,
                "duration" => applicant.duration as f64,
                "job" => applicant.job as f64,
                LLM_CONFIDENCE_FEATURE => llm_confidence.filter(|c| c.is_finite()).unwrap_or(0.0),
                categorical => match (self.encoders.get(categorical), applicant.category(categorical)) {
                    (Some(enc), Some(value)) => enc.transform_or_default(value) as f64,
                    _ => 0.0,
                },
            })
            .collect()
    }

    /// Encode a dataset record, taking the confidence from its enrichment.
    pub fn encode_record(&self, record: &CreditRecord) -> Vec<f64> {
        let confidence = record.enrichment.as_ref().map(|e| e.confidence);
        self.encode(&record.applicant, confidence)
    }
}

/// Binary targets (1 = bad risk) for `records`.
///
/// Priority: the `Risk` column when every record carries it, then
/// generative labels when every record is enriched, then the synthetic rule
/// `0.3*(age < 25) + 0.4*(amount > q80) + 0.3*(duration > 24) > 0.5`.
pub fn derive_targets(records: &[CreditRecord]) -> Result<(Vec<u8>, TargetSource), ModelError> {
    if records.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }

    if records.iter().all(|r| r.risk.is_some()) {
        let y = records
            .iter()
            .map(|r| u8::from(r.risk == Some(RiskLabel::Bad)))
            .collect();
        return Ok((y, TargetSource::RiskColumn));
    }

    if records.iter().all(|r| r.enrichment.is_some()) {
        let y = records
            .iter()
            .map(|r| {
                u8::from(
                    r.enrichment
                        .as_ref()
                        .is_some_and(|e| e.prediction == RiskLabel::Bad),
                )
            })
            .collect();
        return Ok((y, TargetSource::LlmLabel));
    }

    let mut amounts: Vec<f64> = records.iter().map(|r| r.applicant.credit_amount).collect();
    amounts.sort_by(|a, b| a.total_cmp(b));
    let q80 = quantile(&amounts, 0.8);

    let y = records
        .iter()
        .map(|r| {
            let a = &r.applicant;
            let mut score = 0.0;
            if a.age < 25 {
                score += 0.3;
            }
            if a.credit_amount > q80 {
                score += 0.4;
            }
            if a.duration > 24 {
                score += 0.3;
            }
            u8::from(score > 0.5)
        })
        .collect();
    Ok((y, TargetSource::SyntheticRule))
}
