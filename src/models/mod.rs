pub mod applicant;
pub mod assessment;

pub use applicant::{CreditRecord, CreditRequest, Enrichment, UNKNOWN_CATEGORY};
pub use assessment::{LlmAssessment, PredictionResponse, Recommendation, RiskLabel};
