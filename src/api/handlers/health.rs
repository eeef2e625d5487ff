use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "models": {
            "ml_model": state.model.is_some(),
            "bedrock_client": state.labeler.is_some(),
        },
        "system_status": state.monitor.status(),
    }))
}
