mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use credit_risk::api::router::create_router;
use credit_risk::bedrock::RiskLabeler;
use credit_risk::dataset::load_records;
use credit_risk::ml;
use credit_risk::models::{Recommendation, RiskLabel};

use common::StubLabeler;

fn trained_model(dir: &std::path::Path) -> ml::ModelArtifact {
    let path = common::write_dataset(dir, 300);
    let dataset = load_records(&path).unwrap();
    ml::train(&dataset, &common::quick_options()).unwrap()
}

fn stub(prediction: RiskLabel) -> Option<Arc<dyn RiskLabeler>> {
    Some(Arc::new(StubLabeler {
        prediction,
        confidence: 0.85,
    }))
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn predict_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_root() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(common::build_state(common::test_config(dir.path()), None, None));

    let resp = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "running");
    assert_eq!(json["endpoints"]["predict"], "POST /predict");
}

#[tokio::test]
async fn test_health_check_reports_components() {
    let dir = tempfile::tempdir().unwrap();
    let state = common::build_state(common::test_config(dir.path()), None, stub(RiskLabel::Good));
    let app = create_router(state);

    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["models"]["ml_model"], false);
    assert_eq!(json["models"]["bedrock_client"], true);
    assert_eq!(json["system_status"], "STARTING");
}

#[tokio::test]
async fn test_predict_without_model_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path());
    let logs_dir = config.logs_dir.clone();
    let app = create_router(common::build_state(config, None, stub(RiskLabel::Good)));

    let resp = app
        .oneshot(predict_request(common::sample_request().to_string()))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);

    let errors = std::fs::read_to_string(logs_dir.join("errors.jsonl")).unwrap();
    assert!(errors.contains("MODEL_UNAVAILABLE"));
}

#[tokio::test]
async fn test_predict_combines_both_models() {
    let dir = tempfile::tempdir().unwrap();
    let model = trained_model(dir.path());
    let state = common::build_state(
        common::test_config(dir.path()),
        Some(model),
        stub(RiskLabel::Bad),
    );
    let app = create_router(state);

    let resp = app
        .clone()
        .oneshot(predict_request(common::sample_request().to_string()))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;

    let ml_prediction: RiskLabel = json["ml_prediction"].as_str().unwrap().parse().unwrap();
    let p = json["ml_probability"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&p));
    assert_eq!(ml_prediction, RiskLabel::from_probability(p));
    assert_eq!(json["bedrock_prediction"], "bad");
    assert_eq!(json["bedrock_confidence"], 0.85);
    assert_eq!(json["bedrock_reasoning"], "stubbed");
    assert_eq!(
        json["recommendation"],
        Recommendation::combine(ml_prediction, RiskLabel::Bad).message()
    );
    assert!(json["response_time"].as_f64().unwrap() >= 0.0);

    // The prediction shows up in the monitoring summary.
    let resp = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["total_predictions"], 1);
    assert_eq!(json["bedrock_distribution"]["bad"], 1);
    assert_eq!(json["recent_predictions"].as_array().unwrap().len(), 1);
    assert!(json["status"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_predictions_keep_jsonl_intact() {
    let dir = tempfile::tempdir().unwrap();
    let model = trained_model(dir.path());
    let config = common::test_config(dir.path());
    let logs_dir = config.logs_dir.clone();
    let app = create_router(common::build_state(config, Some(model), stub(RiskLabel::Good)));

    let calls: Vec<_> = (0..40)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                app.oneshot(predict_request(common::sample_request().to_string()))
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();
    for call in calls {
        assert_eq!(call.await.unwrap(), StatusCode::OK);
    }

    let log = std::fs::read_to_string(logs_dir.join("predictions.jsonl")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 40);
    for line in lines {
        let entry: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(entry["bedrock_prediction"], "good");
    }
}

#[tokio::test]
async fn test_predict_rejects_invalid_applicant() {
    let dir = tempfile::tempdir().unwrap();
    let model = trained_model(dir.path());
    let app = create_router(common::build_state(
        common::test_config(dir.path()),
        Some(model),
        stub(RiskLabel::Good),
    ));

    let mut body = common::sample_request();
    body["job"] = serde_json::json!(7);
    let resp = app
        .clone()
        .oneshot(predict_request(body.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert!(json["error"].as_str().unwrap().contains("job"));

    let resp = app
        .oneshot(predict_request("{\"age\": \"old\"}".into()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predict_requires_token_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let model = trained_model(dir.path());
    let mut config = common::test_config(dir.path());
    config.api_token = Some("secret".into());
    let app = create_router(common::build_state(config, Some(model), stub(RiskLabel::Good)));

    let resp = app
        .clone()
        .oneshot(predict_request(common::sample_request().to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let mut req = predict_request(common::sample_request().to_string());
    req.headers_mut()
        .insert("authorization", "Bearer secret".parse().unwrap());
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Health stays public.
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_empty_and_prometheus() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(common::build_state(common::test_config(dir.path()), None, None));

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert!(json["message"].is_string());

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/metrics/prometheus")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("bedrock_requests_total"));
}
