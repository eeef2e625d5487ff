use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EvaluationReport, FeatureEncoder, ModelError, RandomForest, TargetSource};
use crate::models::{CreditRequest, RiskLabel};

/// Everything needed to score an applicant, persisted as one JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_name: String,
    pub trained_at: DateTime<Utc>,
    pub target_source: TargetSource,
    pub features: FeatureEncoder,
    pub forest: RandomForest,
    pub evaluation: EvaluationReport,
    pub train_rows: usize,
    pub test_rows: usize,
}

impl ModelArtifact {
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let io_err = |source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_vec(self)?;
        fs::write(path, json).map_err(io_err)?;

        tracing::info!(
            path = %path.display(),
            model = %self.model_name,
            trees = self.forest.n_trees(),
            "Model saved"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let bytes = fs::read(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: Self = serde_json::from_slice(&bytes)?;

        let expected = artifact.features.columns().len();
        if artifact.forest.n_features() != expected {
            return Err(ModelError::FeatureMismatch {
                expected,
                got: artifact.forest.n_features(),
            });
        }

        tracing::info!(
            path = %path.display(),
            model = %artifact.model_name,
            trained_at = %artifact.trained_at,
            accuracy = artifact.evaluation.accuracy,
            "Model loaded"
        );
        Ok(artifact)
    }

    pub fn uses_llm_confidence(&self) -> bool {
        self.features.uses_llm_confidence()
    }

    /// P(bad) for one applicant.
    pub fn predict_proba(
        &self,
        applicant: &CreditRequest,
        llm_confidence: Option<f64>,
    ) -> Result<f64, ModelError> {
        let row = self.features.encode(applicant, llm_confidence);
        self.forest.predict_proba(&row)
    }

    pub fn predict(
        &self,
        applicant: &CreditRequest,
        llm_confidence: Option<f64>,
    ) -> Result<(RiskLabel, f64), ModelError> {
        let p_bad = self.predict_proba(applicant, llm_confidence)?;
        Ok((RiskLabel::from_probability(p_bad), p_bad))
    }

    /// Feature importances paired with their column names, highest first.
    pub fn ranked_importances(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .features
            .columns()
            .iter()
            .cloned()
            .zip(self.forest.feature_importances())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}
