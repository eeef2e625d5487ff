use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::bedrock;
use crate::errors::AppError;
use crate::models::{CreditRequest, PredictionResponse, Recommendation};
use crate::services::Monitor;
use crate::AppState;

/// POST /predict: score an applicant with both models and recommend a
/// decision.
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<CreditRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, AppError> {
    let started = Instant::now();
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let (Some(model), Some(labeler)) = (state.model.as_ref(), state.labeler.as_ref()) else {
        let req = request.clone();
        with_monitor(&state.monitor, move |m| {
            m.log_error("MODEL_UNAVAILABLE", "Models not available", Some(&req));
        })
        .await;
        return Err(AppError::Unavailable("Models not available".into()));
    };

    request.validate().map_err(AppError::BadRequest)?;

    let description = bedrock::generate_description(&**labeler, &request).await;
    let assessment = bedrock::classify(&**labeler, &request, &description).await;

    // The confidence feature only exists on models trained with it.
    let llm_confidence = model
        .uses_llm_confidence()
        .then_some(assessment.confidence);
    let (ml_prediction, ml_probability) = match model.predict(&request, llm_confidence) {
        Ok(v) => v,
        Err(e) => {
            let (message, req) = (e.to_string(), request.clone());
            with_monitor(&state.monitor, move |m| {
                m.log_error("PREDICTION_ERROR", &message, Some(&req));
            })
            .await;
            return Err(e.into());
        }
    };

    let recommendation = Recommendation::combine(ml_prediction, assessment.prediction);
    let response_time = started.elapsed().as_secs_f64();

    let (req, llm_prediction, llm_score) =
        (request, assessment.prediction, assessment.confidence);
    with_monitor(&state.monitor, move |m| {
        m.log_prediction(
            &req,
            ml_prediction,
            ml_probability,
            llm_prediction,
            llm_score,
            response_time,
        );
    })
    .await;

    Ok(Json(PredictionResponse {
        ml_prediction,
        ml_probability,
        bedrock_prediction: assessment.prediction,
        bedrock_confidence: assessment.confidence,
        bedrock_reasoning: assessment.reasoning,
        recommendation: recommendation.message().to_string(),
        response_time,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// Run a monitor call on the blocking pool; it appends to log files.
async fn with_monitor<F>(monitor: &Arc<Monitor>, f: F)
where
    F: FnOnce(&Monitor) + Send + 'static,
{
    let monitor = Arc::clone(monitor);
    if let Err(e) = tokio::task::spawn_blocking(move || f(&monitor)).await {
        tracing::error!(error = %e, "Monitor task failed");
    }
}
