use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;

use crate::AppState;

/// Monitoring summary as JSON.
pub async fn summary(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.summary())
}

pub async fn render(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics_handle.render();
    ([(CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
