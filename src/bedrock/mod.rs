//! Generative risk labeling through Amazon Bedrock.

pub mod client;
pub mod prompts;
pub mod sigv4;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CreditRequest, LlmAssessment};

pub use client::BedrockClient;
pub use prompts::parse_classification;

#[derive(Debug, Error)]
pub enum BedrockError {
    #[error("AWS credentials are not configured")]
    MissingCredentials,

    #[error("invalid Bedrock endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bedrock returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Source of generative descriptions and risk assessments.
#[async_trait]
pub trait RiskLabeler: Send + Sync {
    /// Short narrative description of the applicant.
    async fn describe(&self, applicant: &CreditRequest) -> Result<String, BedrockError>;

    /// Risk label for the applicant given its description.
    async fn assess(
        &self,
        applicant: &CreditRequest,
        description: &str,
    ) -> Result<LlmAssessment, BedrockError>;
}

/// Description that never fails: errors become the description text.
pub async fn generate_description(labeler: &dyn RiskLabeler, applicant: &CreditRequest) -> String {
    match labeler.describe(applicant).await {
        Ok(description) => {
            tracing::debug!(chars = description.len(), "Description generated");
            description
        }
        Err(e) => {
            tracing::error!(error = %e, "Description generation failed");
            format!("Error generating description: {e}")
        }
    }
}

/// Assessment that never fails: errors become an `unknown` label with
/// zero confidence.
pub async fn classify(
    labeler: &dyn RiskLabeler,
    applicant: &CreditRequest,
    description: &str,
) -> LlmAssessment {
    match labeler.assess(applicant, description).await {
        Ok(assessment) => {
            tracing::debug!(
                prediction = %assessment.prediction,
                confidence = assessment.confidence,
                "Classification completed"
            );
            assessment
        }
        Err(e) => {
            tracing::error!(error = %e, "Classification failed");
            LlmAssessment::unknown(format!("Error: {e}"))
        }
    }
}
