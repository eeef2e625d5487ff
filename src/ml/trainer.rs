use chrono::Utc;

use super::{
    derive_targets, stratified_split, EvaluationReport, FeatureEncoder, ForestParams, ModelArtifact,
    ModelError, RandomForest,
};
use crate::dataset::LoadedDataset;

#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub forest: ForestParams,
    /// Hold-out fraction for evaluation.
    pub test_size: f64,
    pub include_llm_confidence: bool,
    pub model_name: String,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            forest: ForestParams::default(),
            test_size: 0.2,
            include_llm_confidence: false,
            model_name: "credit-risk-model".into(),
        }
    }
}

/// Derive targets, split, fit the forest on the training part and evaluate
/// it on the hold-out part.
pub fn train(dataset: &LoadedDataset, options: &TrainOptions) -> Result<ModelArtifact, ModelError> {
    let records = &dataset.records;
    if records.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if options.include_llm_confidence && !records.iter().all(|r| r.enrichment.is_some()) {
        return Err(ModelError::InvalidParams(
            "LLM confidence feature requested but the dataset is not enriched".into(),
        ));
    }

    let (y, target_source) = derive_targets(records)?;
    let n_bad = y.iter().filter(|&&v| v == 1).count();
    tracing::info!(
        rows = records.len(),
        bad = n_bad,
        good = y.len() - n_bad,
        target = ?target_source,
        "Targets derived"
    );

    let (train_idx, test_idx) = stratified_split(&y, options.test_size, options.forest.seed)?;

    // Encoders are fitted on every row so the hold-out never sees an
    // unseen category.
    let features = FeatureEncoder::fit(records, options.include_llm_confidence);
    let x: Vec<Vec<f64>> = records.iter().map(|r| features.encode_record(r)).collect();

    let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
    let y_train: Vec<u8> = train_idx.iter().map(|&i| y[i]).collect();
    let x_test: Vec<Vec<f64>> = test_idx.iter().map(|&i| x[i].clone()).collect();
    let y_test: Vec<u8> = test_idx.iter().map(|&i| y[i]).collect();

    let started = std::time::Instant::now();
    let forest = RandomForest::fit(&x_train, &y_train, options.forest.clone())?;

    let predicted: Vec<u8> = forest
        .predict_proba_batch(&x_test)?
        .into_iter()
        .map(|p| u8::from(p > 0.5))
        .collect();
    let evaluation = EvaluationReport::from_predictions(&y_test, &predicted);

    tracing::info!(
        train_rows = train_idx.len(),
        test_rows = test_idx.len(),
        trees = forest.n_trees(),
        accuracy = evaluation.accuracy,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Model trained"
    );

    Ok(ModelArtifact {
        model_name: options.model_name.clone(),
        trained_at: Utc::now(),
        target_source,
        features,
        forest,
        evaluation,
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
    })
}
