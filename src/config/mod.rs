use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-haiku-20240307-v1:0";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub project_name: String,
    pub model_name: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Bearer token required on `/predict` when set.
    pub api_token: Option<String>,

    // Filesystem layout
    pub data_dir: PathBuf,
    pub models_dir: PathBuf,
    pub logs_dir: PathBuf,

    pub bedrock: BedrockConfig,
    pub alerts: AlertThresholds,
}

/// Bedrock runtime settings plus the AWS credentials used to sign requests.
#[derive(Debug, Clone)]
pub struct BedrockConfig {
    pub region: String,
    pub model_id: String,
    /// Upper bound on `max_tokens` for any single invocation.
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout: Duration,
    /// Overrides `https://bedrock-runtime.{region}.amazonaws.com`.
    pub endpoint: Option<String>,
    pub credentials: Option<AwsCredentials>,
}

#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Monitoring thresholds. Alerts and status look at the last `window`
/// predictions and at errors raised within `error_window`.
#[derive(Debug, Clone)]
pub struct AlertThresholds {
    pub window: usize,
    pub min_agreement: f64,
    pub max_avg_latency_secs: f64,
    pub max_recent_errors: usize,
    pub error_window: Duration,
    pub history_limit: usize,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            window: 10,
            min_agreement: 0.70,
            max_avg_latency_secs: 5.0,
            max_recent_errors: 5,
            error_window: Duration::from_secs(3600),
            history_limit: 10_000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let region = env::var("AWS_REGION").unwrap_or_else(|_| DEFAULT_REGION.into());

        let credentials = match (
            env::var("AWS_ACCESS_KEY_ID").ok().filter(|s| !s.is_empty()),
            env::var("AWS_SECRET_ACCESS_KEY").ok().filter(|s| !s.is_empty()),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AwsCredentials {
                access_key_id,
                secret_access_key,
                session_token: env::var("AWS_SESSION_TOKEN").ok().filter(|s| !s.is_empty()),
            }),
            _ => None,
        };

        let defaults = AlertThresholds::default();

        Ok(Self {
            project_name: env::var("PROJECT_NAME")
                .unwrap_or_else(|_| "credit-risk-detection".into()),
            model_name: env::var("MODEL_NAME").unwrap_or_else(|_| "credit-risk-model".into()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".into())
                .parse()?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            api_token: env::var("API_TOKEN").ok().filter(|s| !s.is_empty()),

            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".into()).into(),
            models_dir: env::var("MODELS_DIR").unwrap_or_else(|_| "models".into()).into(),
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".into()).into(),

            bedrock: BedrockConfig {
                region: env::var("BEDROCK_REGION").unwrap_or_else(|_| region.clone()),
                model_id: env::var("BEDROCK_MODEL_ID")
                    .unwrap_or_else(|_| DEFAULT_MODEL_ID.into()),
                max_tokens: parse_or("BEDROCK_MAX_TOKENS", 1000),
                temperature: parse_or("BEDROCK_TEMPERATURE", 0.1),
                timeout: Duration::from_secs(parse_or("BEDROCK_TIMEOUT_SECS", 60)),
                endpoint: env::var("BEDROCK_ENDPOINT").ok().filter(|s| !s.is_empty()),
                credentials,
            },

            alerts: AlertThresholds {
                window: parse_or("ALERT_WINDOW", defaults.window),
                min_agreement: parse_or("ALERT_MIN_AGREEMENT", defaults.min_agreement),
                max_avg_latency_secs: parse_or(
                    "ALERT_MAX_LATENCY_SECS",
                    defaults.max_avg_latency_secs,
                ),
                max_recent_errors: parse_or("ALERT_MAX_ERRORS", defaults.max_recent_errors),
                error_window: Duration::from_secs(parse_or(
                    "ALERT_ERROR_WINDOW_SECS",
                    defaults.error_window.as_secs(),
                )),
                history_limit: parse_or("MONITOR_HISTORY_LIMIT", defaults.history_limit),
            },
        })
    }

    /// Default location of the trained model artifact.
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(format!("{}.json", self.model_name))
    }

    pub fn original_data_file(&self) -> PathBuf {
        self.data_dir.join("credit_risk_reto.csv")
    }

    pub fn enriched_data_file(&self) -> PathBuf {
        self.data_dir.join("credit_risk_enriched.csv")
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_model_name() {
        let config = AppConfig {
            project_name: "p".into(),
            model_name: "credit-risk-model".into(),
            host: "127.0.0.1".into(),
            port: 0,
            log_level: "info".into(),
            api_token: None,
            data_dir: "data".into(),
            models_dir: "models".into(),
            logs_dir: "logs".into(),
            bedrock: BedrockConfig {
                region: DEFAULT_REGION.into(),
                model_id: DEFAULT_MODEL_ID.into(),
                max_tokens: 1000,
                temperature: 0.1,
                timeout: Duration::from_secs(60),
                endpoint: None,
                credentials: None,
            },
            alerts: AlertThresholds::default(),
        };

        assert_eq!(config.model_path(), PathBuf::from("models/credit-risk-model.json"));
        assert_eq!(
            config.enriched_data_file(),
            PathBuf::from("data/credit_risk_enriched.csv")
        );
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = AwsCredentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "super-secret".into(),
            session_token: Some("token".into()),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("AKIDEXAMPLE"));
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("\"token\""));
    }
}
