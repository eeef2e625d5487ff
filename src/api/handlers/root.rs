use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::AppState;

pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "message": "Credit Risk Detection API with Monitoring",
        "project": state.config.project_name,
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "predict": "POST /predict",
            "health": "GET /health",
            "metrics": "GET /metrics",
            "prometheus": "GET /metrics/prometheus",
        },
    }))
}
