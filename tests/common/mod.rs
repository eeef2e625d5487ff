use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use credit_risk::bedrock::{BedrockError, RiskLabeler};
use credit_risk::config::{AlertThresholds, AppConfig, BedrockConfig};
use credit_risk::ml::{ForestParams, ModelArtifact, TrainOptions};
use credit_risk::models::{CreditRequest, LlmAssessment, RiskLabel};
use credit_risk::services::Monitor;
use credit_risk::AppState;

/// Deterministic German-credit-like dataset with a `Risk` column.
/// Bad risk follows large amounts, long durations and young applicants.
#[allow(dead_code)]
pub fn synthetic_csv(rows: usize) -> String {
    let sexes = ["male", "female"];
    let housing = ["own", "rent", "free"];
    let savings = ["", "little", "moderate", "quite rich", "rich"];
    let checking = ["", "little", "moderate", "rich"];
    let purposes = ["car", "radio/TV", "education", "business", "furniture/equipment"];

    let mut csv = String::from(
        ",Age,Sex,Job,Housing,Saving accounts,Checking account,Credit amount,Duration,Purpose,Risk\n",
    );
    for i in 0..rows {
        let age = 19 + (i * 13) % 56;
        let amount = 250 + (i * 797) % 15_000;
        let duration = 4 + (i * 11) % 68;
        let score = u8::from(amount > 9_000) * 2 + u8::from(duration > 36) * 2 + u8::from(age < 25);
        let risk = if score >= 2 { "bad" } else { "good" };
        csv.push_str(&format!(
            "{i},{age},{},{},{},{},{},{amount},{duration},{},{risk}\n",
            sexes[i % 2],
            i % 4,
            housing[i % 3],
            savings[i % 5],
            checking[(i / 2) % 4],
            purposes[i % 5],
        ));
    }
    csv
}

#[allow(dead_code)]
pub fn write_dataset(dir: &Path, rows: usize) -> PathBuf {
    let path = dir.join("credit_risk_reto.csv");
    std::fs::write(&path, synthetic_csv(rows)).expect("write dataset");
    path
}

#[allow(dead_code)]
pub fn quick_options() -> TrainOptions {
    TrainOptions {
        forest: ForestParams {
            n_estimators: 15,
            ..ForestParams::default()
        },
        ..TrainOptions::default()
    }
}

#[allow(dead_code)]
pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        project_name: "credit-risk-detection".into(),
        model_name: "credit-risk-model".into(),
        host: "127.0.0.1".into(),
        port: 0,
        log_level: "info".into(),
        api_token: None,
        data_dir: dir.join("data"),
        models_dir: dir.join("models"),
        logs_dir: dir.join("logs"),
        bedrock: BedrockConfig {
            region: "us-east-1".into(),
            model_id: "anthropic.claude-3-haiku-20240307-v1:0".into(),
            max_tokens: 1000,
            temperature: 0.1,
            timeout: Duration::from_secs(5),
            endpoint: None,
            credentials: None,
        },
        alerts: AlertThresholds::default(),
    }
}

/// Labeler that answers every applicant with a fixed assessment.
pub struct StubLabeler {
    pub prediction: RiskLabel,
    pub confidence: f64,
}

#[async_trait]
impl RiskLabeler for StubLabeler {
    async fn describe(&self, applicant: &CreditRequest) -> Result<String, BedrockError> {
        Ok(format!(
            "Client aged {} requesting {} for {}.",
            applicant.age, applicant.credit_amount, applicant.purpose
        ))
    }

    async fn assess(
        &self,
        _applicant: &CreditRequest,
        _description: &str,
    ) -> Result<LlmAssessment, BedrockError> {
        Ok(LlmAssessment {
            prediction: self.prediction,
            confidence: self.confidence,
            reasoning: "stubbed".into(),
        })
    }
}

#[allow(dead_code)]
pub fn build_state(
    config: AppConfig,
    model: Option<ModelArtifact>,
    labeler: Option<Arc<dyn RiskLabeler>>,
) -> AppState {
    let monitor = Monitor::new(&config.logs_dir, config.alerts.clone()).expect("monitor");
    AppState {
        config,
        model: model.map(Arc::new),
        labeler,
        monitor: Arc::new(monitor),
        metrics_handle: credit_risk::metrics::init_metrics().expect("metrics recorder"),
    }
}

#[allow(dead_code)]
pub fn sample_request() -> serde_json::Value {
    serde_json::json!({
        "age": 35,
        "sex": "male",
        "job": 2,
        "housing": "own",
        "saving_accounts": "little",
        "checking_account": "moderate",
        "credit_amount": 5000.0,
        "duration": 24,
        "purpose": "car"
    })
}
