pub mod api;
pub mod bedrock;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod services;

use std::sync::Arc;

use crate::bedrock::RiskLabeler;
use crate::config::AppConfig;
use crate::ml::ModelArtifact;
use crate::services::Monitor;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// Absent when no trained model could be loaded.
    pub model: Option<Arc<ModelArtifact>>,
    /// Absent when AWS credentials are missing.
    pub labeler: Option<Arc<dyn RiskLabeler>>,
    pub monitor: Arc<Monitor>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
