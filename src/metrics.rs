use std::sync::Mutex;

use metrics::{counter, describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

static HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload. The recorder is process-global, so
/// later calls return the handle installed by the first.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let mut slot = HANDLE.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(handle) = slot.as_ref() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!("predictions_total", "Predictions served by /predict");
    describe_counter!(
        "model_agreements_total",
        "Predictions where the forest and the generative model agreed"
    );
    describe_counter!("prediction_errors_total", "Monitored errors by kind");
    describe_counter!("bedrock_requests_total", "Bedrock InvokeModel calls");
    describe_counter!("bedrock_failures_total", "Failed Bedrock InvokeModel calls");
    describe_histogram!(
        "prediction_latency_seconds",
        Unit::Seconds,
        "End-to-end /predict latency"
    );

    // Pre-register counters so they appear even before the first increment.
    // The latency histogram appears with its first real observation.
    counter!("predictions_total").absolute(0);
    counter!("model_agreements_total").absolute(0);
    counter!("bedrock_requests_total").absolute(0);
    counter!("bedrock_failures_total").absolute(0);

    *slot = Some(handle.clone());
    Ok(handle)
}
