//! Supervised credit-risk classifier: feature encoding, a bagged CART
//! ensemble, hold-out evaluation and the persisted model artifact.

pub mod artifact;
pub mod encoder;
pub mod evaluation;
pub mod features;
pub mod forest;
pub mod split;
pub mod trainer;
pub mod tree;

use std::path::PathBuf;

use thiserror::Error;

use crate::dataset::DatasetError;

pub use artifact::ModelArtifact;
pub use encoder::LabelEncoder;
pub use evaluation::{ClassMetrics, ConfusionMatrix, EvaluationReport};
pub use features::{derive_targets, FeatureEncoder, TargetSource};
pub use forest::{ForestParams, MaxFeatures, RandomForest};
pub use split::stratified_split;
pub use trainer::{train, TrainOptions};
pub use tree::DecisionTree;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("training set contains a single class ({0}); need both good and bad")]
    SingleClass(&'static str),

    #[error("feature vector has {got} values, model expects {expected}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("invalid parameter: {0}")]
    InvalidParams(String),
}
