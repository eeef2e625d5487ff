use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::RiskLabel;

/// Placeholder used for missing categorical values, both at training and
/// at serving time.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Body of `POST /predict`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditRequest {
    pub age: u32,
    pub sex: String,
    /// Skill level code (0 = unskilled non-resident .. 3 = highly skilled).
    pub job: u8,
    pub housing: String,
    #[serde(default)]
    pub saving_accounts: Option<String>,
    #[serde(default)]
    pub checking_account: Option<String>,
    pub credit_amount: f64,
    /// Loan duration in months.
    pub duration: u32,
    pub purpose: String,
}

impl CreditRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.age == 0 {
            return Err("age must be positive".into());
        }
        if !self.credit_amount.is_finite() || self.credit_amount < 0.0 {
            return Err("credit_amount must be a non-negative number".into());
        }
        if self.duration == 0 {
            return Err("duration must be positive".into());
        }
        if self.job > 3 {
            return Err(format!("job must be between 0 and 3, got {}", self.job));
        }
        for (name, value) in [
            ("sex", &self.sex),
            ("housing", &self.housing),
            ("purpose", &self.purpose),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{name} must not be empty"));
            }
        }
        Ok(())
    }

    /// Categorical value for an encoded feature column. Missing optional
    /// fields map to [`UNKNOWN_CATEGORY`].
    pub fn category(&self, column: &str) -> Option<&str> {
        let value = match column {
            "sex" => Some(self.sex.as_str()),
            "housing" => Some(self.housing.as_str()),
            "saving_accounts" => {
                Some(self.saving_accounts.as_deref().unwrap_or(UNKNOWN_CATEGORY))
            }
            "checking_account" => {
                Some(self.checking_account.as_deref().unwrap_or(UNKNOWN_CATEGORY))
            }
            "purpose" => Some(self.purpose.as_str()),
            _ => None,
        };
        value.map(|v| if v.trim().is_empty() { UNKNOWN_CATEGORY } else { v })
    }

    /// The applicant as the JSON object embedded in generative prompts.
    pub fn customer_data(&self) -> Value {
        let mut data = json!({
            "age": self.age,
            "sex": self.sex,
            "job": self.job,
            "housing": self.housing,
            "credit_amount": self.credit_amount,
            "duration": self.duration,
            "purpose": self.purpose,
        });
        if let Some(map) = data.as_object_mut() {
            if let Some(s) = &self.saving_accounts {
                map.insert("saving_accounts".into(), json!(s));
            }
            if let Some(c) = &self.checking_account {
                map.insert("checking_account".into(), json!(c));
            }
        }
        data
    }
}

/// One row of the credit-risk dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditRecord {
    /// 1-based CSV line the record was read from.
    pub line: usize,
    pub applicant: CreditRequest,
    /// Ground-truth label, when the dataset carries a `Risk` column.
    pub risk: Option<RiskLabel>,
    /// Generative label columns, present on enriched datasets.
    pub enrichment: Option<Enrichment>,
    /// Every field of the source row, in header order.
    pub raw: Vec<String>,
}

/// Generative-model output attached to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub description: String,
    pub prediction: RiskLabel,
    pub confidence: f64,
    pub reasoning: String,
}
