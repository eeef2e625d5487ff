use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AlertThresholds;
use crate::models::{CreditRequest, RiskLabel};

pub const PREDICTIONS_FILE: &str = "predictions.jsonl";
pub const ERRORS_FILE: &str = "errors.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemStatus {
    Starting,
    Healthy,
    Warning,
    Degraded,
    Critical,
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SystemStatus::Starting => "STARTING",
            SystemStatus::Healthy => "HEALTHY",
            SystemStatus::Warning => "WARNING",
            SystemStatus::Degraded => "DEGRADED",
            SystemStatus::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionLog {
    pub timestamp: DateTime<Utc>,
    pub request: CreditRequest,
    pub ml_prediction: RiskLabel,
    pub ml_probability: f64,
    pub bedrock_prediction: RiskLabel,
    pub bedrock_confidence: f64,
    pub agreement: bool,
    pub response_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLog {
    pub timestamp: DateTime<Utc>,
    pub error_type: String,
    pub error_message: String,
    pub request_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    LowAgreement { rate_pct: f64 },
    HighLatency { avg_secs: f64 },
    ErrorBurst { count: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDistribution {
    pub good: u64,
    pub bad: u64,
}

impl LabelDistribution {
    fn record(&mut self, label: RiskLabel) {
        match label {
            RiskLabel::Good => self.good += 1,
            RiskLabel::Bad => self.bad += 1,
            RiskLabel::Unknown | RiskLabel::Error => {}
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub total_predictions: u64,
    /// Percentage of predictions where both models agreed.
    pub agreement_rate: f64,
    pub avg_response_time: f64,
    pub ml_distribution: LabelDistribution,
    pub bedrock_distribution: LabelDistribution,
    pub total_errors: u64,
    pub recent_predictions: Vec<PredictionLog>,
    pub status: SystemStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricsSummary {
    Report(Box<MetricsReport>),
    Empty { message: String },
}

#[derive(Debug, Default)]
struct MonitorState {
    predictions: VecDeque<PredictionLog>,
    errors: VecDeque<ErrorLog>,
    total_predictions: u64,
    total_agreements: u64,
    total_errors: u64,
    response_time_sum: f64,
    ml_distribution: LabelDistribution,
    bedrock_distribution: LabelDistribution,
}

/// Append-only JSON Lines file. The handle stays open for the monitor's
/// lifetime and every record goes out in one `write_all` under the lock, so
/// concurrent appends never share a line.
#[derive(Debug)]
struct JsonlLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlLog {
    fn open(path: PathBuf) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    fn append<T: Serialize>(&self, entry: &T) {
        let result = serde_json::to_string(entry)
            .map_err(std::io::Error::from)
            .and_then(|mut line| {
                line.push('\n');
                let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
                file.write_all(line.as_bytes())
            });
        if let Err(e) = result {
            tracing::warn!(error = %e, path = %self.path.display(), "Failed to append monitor log");
        }
    }
}

/// Tracks served predictions and errors, appends them to JSONL logs and
/// raises alerts when agreement, latency or error rates degrade.
///
/// All methods block on file I/O; async callers should run them on the
/// blocking pool.
#[derive(Debug)]
pub struct Monitor {
    log_dir: PathBuf,
    thresholds: AlertThresholds,
    predictions_log: JsonlLog,
    errors_log: JsonlLog,
    state: Mutex<MonitorState>,
}

impl Monitor {
    pub fn new(log_dir: impl Into<PathBuf>, thresholds: AlertThresholds) -> std::io::Result<Self> {
        let log_dir = log_dir.into();
        fs::create_dir_all(&log_dir)?;
        let predictions_log = JsonlLog::open(log_dir.join(PREDICTIONS_FILE))?;
        let errors_log = JsonlLog::open(log_dir.join(ERRORS_FILE))?;
        tracing::info!(log_dir = %log_dir.display(), "Monitor initialised");
        Ok(Self {
            log_dir,
            thresholds,
            predictions_log,
            errors_log,
            state: Mutex::new(MonitorState::default()),
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn log_prediction(
        &self,
        request: &CreditRequest,
        ml_prediction: RiskLabel,
        ml_probability: f64,
        bedrock_prediction: RiskLabel,
        bedrock_confidence: f64,
        response_time: f64,
    ) -> PredictionLog {
        let entry = PredictionLog {
            timestamp: Utc::now(),
            request: request.clone(),
            ml_prediction,
            ml_probability,
            bedrock_prediction,
            bedrock_confidence,
            agreement: ml_prediction == bedrock_prediction,
            response_time,
        };

        counter!("predictions_total").increment(1);
        if entry.agreement {
            counter!("model_agreements_total").increment(1);
        }
        histogram!("prediction_latency_seconds").record(response_time);

        tracing::info!(
            ml = %ml_prediction,
            ml_probability,
            bedrock = %bedrock_prediction,
            bedrock_confidence,
            agreement = entry.agreement,
            response_time,
            "Prediction served"
        );

        self.predictions_log.append(&entry);
        self.push_prediction(entry.clone());
        self.check_alerts();
        entry
    }

    pub fn log_error(&self, error_type: &str, message: &str, request: Option<&CreditRequest>) {
        let entry = ErrorLog {
            timestamp: Utc::now(),
            error_type: error_type.to_string(),
            error_message: message.to_string(),
            request_data: request.and_then(|r| serde_json::to_value(r).ok()),
        };

        counter!("prediction_errors_total", "kind" => error_type.to_string()).increment(1);
        tracing::error!(error_type, error = message, "Monitored error");

        self.errors_log.append(&entry);
        self.push_error(entry);
    }

    fn push_prediction(&self, entry: PredictionLog) {
        let mut state = self.state();
        state.total_predictions += 1;
        if entry.agreement {
            state.total_agreements += 1;
        }
        state.response_time_sum += entry.response_time;
        state.ml_distribution.record(entry.ml_prediction);
        state.bedrock_distribution.record(entry.bedrock_prediction);

        state.predictions.push_back(entry);
        while state.predictions.len() > self.thresholds.history_limit.max(self.thresholds.window) {
            state.predictions.pop_front();
        }
    }

    fn push_error(&self, entry: ErrorLog) {
        let mut state = self.state();
        state.total_errors += 1;
        state.errors.push_back(entry);
        while state.errors.len() > self.thresholds.history_limit.max(1) {
            state.errors.pop_front();
        }
    }

    /// Agreement ratio and mean latency over the most recent window.
    fn window_stats(&self, state: &MonitorState) -> Option<(f64, f64)> {
        let n = state.predictions.len().min(self.thresholds.window.max(1));
        if n == 0 {
            return None;
        }
        let recent = state.predictions.iter().skip(state.predictions.len() - n);
        let (agreements, latency) = recent.fold((0usize, 0.0), |(a, l), p| {
            (a + usize::from(p.agreement), l + p.response_time)
        });
        Some((agreements as f64 / n as f64, latency / n as f64))
    }

    fn recent_errors_at(&self, state: &MonitorState, now: DateTime<Utc>) -> usize {
        let window = chrono::Duration::from_std(self.thresholds.error_window)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        state
            .errors
            .iter()
            .filter(|e| now.signed_duration_since(e.timestamp) < window)
            .count()
    }

    /// Evaluate alert conditions and log a warning for each one raised.
    /// Nothing is checked until a full window of predictions exists.
    pub fn check_alerts(&self) -> Vec<Alert> {
        let state = self.state();
        let mut alerts = Vec::new();
        if state.total_predictions < self.thresholds.window as u64 {
            return alerts;
        }

        if let Some((agreement, latency)) = self.window_stats(&state) {
            if agreement < self.thresholds.min_agreement {
                alerts.push(Alert::LowAgreement {
                    rate_pct: agreement * 100.0,
                });
            }
            if latency > self.thresholds.max_avg_latency_secs {
                alerts.push(Alert::HighLatency { avg_secs: latency });
            }
        }

        let recent_errors = self.recent_errors_at(&state, Utc::now());
        if recent_errors > self.thresholds.max_recent_errors {
            alerts.push(Alert::ErrorBurst {
                count: recent_errors,
            });
        }
        drop(state);

        for alert in &alerts {
            match alert {
                Alert::LowAgreement { rate_pct } => {
                    tracing::warn!(rate_pct = *rate_pct, "ALERT: low agreement between models")
                }
                Alert::HighLatency { avg_secs } => {
                    tracing::warn!(avg_secs = *avg_secs, "ALERT: high response time")
                }
                Alert::ErrorBurst { count } => {
                    tracing::warn!(count = *count, "ALERT: many recent errors")
                }
            }
        }
        alerts
    }

    pub fn status(&self) -> SystemStatus {
        let state = self.state();
        self.status_at(&state, Utc::now())
    }

    fn status_at(&self, state: &MonitorState, now: DateTime<Utc>) -> SystemStatus {
        let Some((agreement, latency)) = self.window_stats(state) else {
            return SystemStatus::Starting;
        };

        if self.recent_errors_at(state, now) > self.thresholds.max_recent_errors {
            SystemStatus::Critical
        } else if agreement < self.thresholds.min_agreement {
            SystemStatus::Warning
        } else if latency > self.thresholds.max_avg_latency_secs {
            SystemStatus::Degraded
        } else {
            SystemStatus::Healthy
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let state = self.state();
        if state.total_predictions == 0 {
            return MetricsSummary::Empty {
                message: "No predictions recorded yet".into(),
            };
        }

        let total = state.total_predictions;
        let recent_n = state.predictions.len().min(self.thresholds.window.max(1));
        let recent_predictions = state
            .predictions
            .iter()
            .skip(state.predictions.len() - recent_n)
            .cloned()
            .collect();

        MetricsSummary::Report(Box::new(MetricsReport {
            total_predictions: total,
            agreement_rate: state.total_agreements as f64 / total as f64 * 100.0,
            avg_response_time: state.response_time_sum / total as f64,
            ml_distribution: state.ml_distribution,
            bedrock_distribution: state.bedrock_distribution,
            total_errors: state.total_errors,
            recent_predictions,
            status: self.status_at(&state, Utc::now()),
        }))
    }
}
