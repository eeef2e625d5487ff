use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Risk class assigned to an applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskLabel {
    Good,
    Bad,
    /// The generative model answered but no label could be extracted.
    Unknown,
    /// Labeling the record failed.
    Error,
}

impl RiskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Good => "good",
            RiskLabel::Bad => "bad",
            RiskLabel::Unknown => "unknown",
            RiskLabel::Error => "error",
        }
    }

    /// Label for a P(bad) score from the classifier.
    pub fn from_probability(p_bad: f64) -> Self {
        if p_bad > 0.5 {
            RiskLabel::Bad
        } else {
            RiskLabel::Good
        }
    }

    pub fn is_decided(&self) -> bool {
        matches!(self, RiskLabel::Good | RiskLabel::Bad)
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "good" => Ok(RiskLabel::Good),
            "bad" => Ok(RiskLabel::Bad),
            "unknown" => Ok(RiskLabel::Unknown),
            "error" => Ok(RiskLabel::Error),
            other => Err(format!("unrecognised risk label '{other}'")),
        }
    }
}

impl Serialize for RiskLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// Case-insensitive: the generative model answers "GOOD"/"BAD".
impl<'de> Deserialize<'de> for RiskLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Label, confidence and rationale returned by the generative model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmAssessment {
    pub prediction: RiskLabel,
    pub confidence: f64,
    pub reasoning: String,
}

impl LlmAssessment {
    pub fn unknown(reasoning: impl Into<String>) -> Self {
        Self {
            prediction: RiskLabel::Unknown,
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }
}

/// Final decision combining the classifier and the generative model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Approve,
    Reject,
    ManualReview,
}

impl Recommendation {
    /// Approve or reject only when both models agree on a decided label.
    pub fn combine(ml: RiskLabel, llm: RiskLabel) -> Self {
        match (ml, llm) {
            (RiskLabel::Bad, RiskLabel::Bad) => Recommendation::Reject,
            (RiskLabel::Good, RiskLabel::Good) => Recommendation::Approve,
            _ => Recommendation::ManualReview,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Recommendation::Approve => "APPROVE - both models predict low risk",
            Recommendation::Reject => "REJECT - both models predict high risk",
            Recommendation::ManualReview => "MANUAL REVIEW - models disagree",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Response body of `POST /predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub ml_prediction: RiskLabel,
    pub ml_probability: f64,
    pub bedrock_prediction: RiskLabel,
    pub bedrock_confidence: f64,
    pub bedrock_reasoning: String,
    pub recommendation: String,
    /// Seconds spent serving the request.
    pub response_time: f64,
    pub timestamp: String,
}
