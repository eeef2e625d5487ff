use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use super::prompts::{classification_prompt, description_prompt, parse_classification};
use super::sigv4::{self, SigningParams};
use super::{BedrockError, RiskLabeler};
use crate::config::{AwsCredentials, BedrockConfig};
use crate::models::{CreditRequest, LlmAssessment};

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const SERVICE: &str = "bedrock";
const TOP_K: u32 = 250;
const TOP_P: f64 = 0.9;

pub const DESCRIPTION_MAX_TOKENS: u32 = 500;
pub const CLASSIFICATION_MAX_TOKENS: u32 = 200;

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    anthropic_version: &'static str,
    max_tokens: u32,
    temperature: f64,
    top_k: u32,
    top_p: f64,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Bedrock runtime `InvokeModel` client for Anthropic models.
#[derive(Debug, Clone)]
pub struct BedrockClient {
    http: Client,
    base_url: Url,
    host: String,
    region: String,
    model_id: String,
    max_tokens: u32,
    temperature: f64,
    credentials: AwsCredentials,
}

impl BedrockClient {
    pub fn new(config: &BedrockConfig) -> Result<Self, BedrockError> {
        let credentials = config
            .credentials
            .clone()
            .ok_or(BedrockError::MissingCredentials)?;

        let base = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", config.region));
        let base_url = Url::parse(&base).map_err(|e| BedrockError::InvalidEndpoint(format!("{base}: {e}")))?;
        let host = match (base_url.host_str(), base_url.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => return Err(BedrockError::InvalidEndpoint(base)),
        };

        let http = Client::builder().timeout(config.timeout).build()?;

        tracing::info!(
            region = %config.region,
            model_id = %config.model_id,
            "Bedrock client initialised"
        );

        Ok(Self {
            http,
            base_url,
            host,
            region: config.region.clone(),
            model_id: config.model_id.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            credentials,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Send one user message and return the trimmed text of the first text
    /// block of the reply. `max_tokens` is capped at the configured limit.
    pub async fn invoke(&self, prompt: &str, max_tokens: u32) -> Result<String, BedrockError> {
        counter!("bedrock_requests_total").increment(1);
        let result = self
            .invoke_inner(prompt, max_tokens.min(self.max_tokens))
            .await;
        if let Err(e) = &result {
            counter!("bedrock_failures_total").increment(1);
            tracing::warn!(error = %e, model_id = %self.model_id, "Bedrock invocation failed");
        }
        result
    }

    async fn invoke_inner(&self, prompt: &str, max_tokens: u32) -> Result<String, BedrockError> {
        let body = serde_json::to_vec(&InvokeRequest {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens,
            temperature: self.temperature,
            top_k: TOP_K,
            top_p: TOP_P,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        })?;

        let base_path = self.base_url.path().trim_end_matches('/');
        let path = format!(
            "{base_path}/model/{}/invoke",
            sigv4::uri_encode(&self.model_id, false)
        );
        let url = self
            .base_url
            .join(&path)
            .map_err(|e| BedrockError::InvalidEndpoint(e.to_string()))?;

        let payload_hash = sigv4::sha256_hex(&body);
        let signed = sigv4::sign(
            &SigningParams {
                credentials: &self.credentials,
                region: &self.region,
                service: SERVICE,
                time: Utc::now(),
            },
            "POST",
            &self.host,
            &path,
            &[
                ("content-type", "application/json"),
                ("x-amz-content-sha256", &payload_hash),
            ],
            &body,
        )?;

        let mut request = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .header("x-amz-content-sha256", &payload_hash);
        for (name, value) in &signed {
            request = request.header(name.as_str(), value.as_str());
        }

        let resp = request.body(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BedrockError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: InvokeResponse = resp.json().await?;
        parsed
            .content
            .into_iter()
            .find(|b| b.kind == "text" || b.kind.is_empty())
            .and_then(|b| b.text)
            .map(|t| t.trim().to_string())
            .ok_or_else(|| BedrockError::Unexpected("response has no text content".into()))
    }
}

#[async_trait]
impl RiskLabeler for BedrockClient {
    async fn describe(&self, applicant: &CreditRequest) -> Result<String, BedrockError> {
        self.invoke(&description_prompt(applicant), DESCRIPTION_MAX_TOKENS)
            .await
    }

    async fn assess(
        &self,
        applicant: &CreditRequest,
        description: &str,
    ) -> Result<LlmAssessment, BedrockError> {
        let reply = self
            .invoke(
                &classification_prompt(applicant, description),
                CLASSIFICATION_MAX_TOKENS,
            )
            .await?;
        Ok(parse_classification(&reply))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;

    fn config(credentials: Option<AwsCredentials>, endpoint: Option<&str>) -> BedrockConfig {
        BedrockConfig {
            region: "us-east-1".into(),
            model_id: "anthropic.claude-3-haiku-20240307-v1:0".into(),
            max_tokens: 1000,
            temperature: 0.1,
            timeout: Duration::from_secs(5),
            endpoint: endpoint.map(str::to_string),
            credentials,
        }
    }

    fn creds() -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKID".into(),
            secret_access_key: "secret".into(),
            session_token: None,
        }
    }

    #[test]
    fn test_requires_credentials() {
        assert!(matches!(
            BedrockClient::new(&config(None, None)),
            Err(BedrockError::MissingCredentials)
        ));
    }

    #[test]
    fn test_default_endpoint_host() {
        let client = BedrockClient::new(&config(Some(creds()), None)).unwrap();
        assert_eq!(client.host, "bedrock-runtime.us-east-1.amazonaws.com");
        assert_eq!(client.model_id(), "anthropic.claude-3-haiku-20240307-v1:0");
    }

    #[test]
    fn test_endpoint_override_keeps_port() {
        let client = BedrockClient::new(&config(Some(creds()), Some("http://localhost:4566"))).unwrap();
        assert_eq!(client.host, "localhost:4566");
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(InvokeRequest {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: 200,
            temperature: 0.1,
            top_k: TOP_K,
            top_p: TOP_P,
            messages: [Message {
                role: "user",
                content: "hi",
            }],
        })
        .unwrap();
        assert_eq!(body["anthropic_version"], "bedrock-2023-05-31");
        assert_eq!(body["max_tokens"], 200);
        assert_eq!(body["top_k"], 250);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    /// What the fake runtime saw for one call.
    #[derive(Debug, Clone)]
    struct Seen {
        model_id: String,
        headers: HeaderMap,
        raw: Vec<u8>,
        body: Value,
    }

    #[derive(Clone)]
    struct FakeRuntime {
        status: StatusCode,
        reply: Value,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    async fn fake_invoke(
        State(fake): State<FakeRuntime>,
        Path(model_id): Path<String>,
        headers: HeaderMap,
        raw: axum::body::Bytes,
    ) -> (StatusCode, Json<Value>) {
        fake.seen.lock().unwrap().push(Seen {
            model_id,
            headers,
            raw: raw.to_vec(),
            body: serde_json::from_slice(&raw).unwrap(),
        });
        (fake.status, Json(fake.reply.clone()))
    }

    /// Serve a fake Bedrock runtime on an ephemeral port and return its
    /// base URL.
    async fn spawn_runtime(fake: FakeRuntime) -> String {
        let app = Router::new()
            .route("/model/:model_id/invoke", post(fake_invoke))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn counter_value(name: &str) -> f64 {
        crate::metrics::init_metrics()
            .unwrap()
            .render()
            .lines()
            .find_map(|l| l.strip_prefix(&format!("{name} "))?.trim().parse().ok())
            .unwrap_or(0.0)
    }

    #[tokio::test]
    async fn test_invoke_signs_request_and_trims_reply() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_runtime(FakeRuntime {
            status: StatusCode::OK,
            reply: json!({
                "content": [
                    {"type": "text", "text": "  hello  "},
                    {"type": "text", "text": "ignored"}
                ]
            }),
            seen: seen.clone(),
        })
        .await;

        let client = BedrockClient::new(&config(Some(creds()), Some(&base))).unwrap();
        let text = client.invoke("Describe the applicant", 500).await.unwrap();
        assert_eq!(text, "hello");

        let calls = seen.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.model_id, "anthropic.claude-3-haiku-20240307-v1:0");

        assert_eq!(call.body["anthropic_version"], "bedrock-2023-05-31");
        assert_eq!(call.body["max_tokens"], 500);
        assert_eq!(call.body["top_k"], 250);
        assert_eq!(call.body["messages"][0]["role"], "user");
        assert_eq!(call.body["messages"][0]["content"], "Describe the applicant");

        let header = |name: &str| call.headers.get(name).unwrap().to_str().unwrap().to_string();
        let authorization = header("authorization");
        assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKID/"));
        assert!(authorization.contains("/us-east-1/bedrock/aws4_request"));
        assert!(authorization
            .contains("SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date"));
        assert!(authorization.contains(&format!("/{}/", &header("x-amz-date")[..8])));
        assert_eq!(header("x-amz-content-sha256"), sigv4::sha256_hex(&call.raw));
        assert_eq!(header("content-type"), "application/json");
    }

    #[tokio::test]
    async fn test_invoke_caps_max_tokens_at_config() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_runtime(FakeRuntime {
            status: StatusCode::OK,
            reply: json!({"content": [{"type": "text", "text": "ok"}]}),
            seen: seen.clone(),
        })
        .await;

        let mut cfg = config(Some(creds()), Some(&base));
        cfg.max_tokens = 150;
        let client = BedrockClient::new(&cfg).unwrap();
        client.invoke("hi", DESCRIPTION_MAX_TOKENS).await.unwrap();

        assert_eq!(seen.lock().unwrap()[0].body["max_tokens"], 150);
    }

    #[tokio::test]
    async fn test_throttled_reply_is_an_api_error() {
        let base = spawn_runtime(FakeRuntime {
            status: StatusCode::TOO_MANY_REQUESTS,
            reply: json!({"message": "Too many requests"}),
            seen: Arc::new(Mutex::new(Vec::new())),
        })
        .await;

        let client = BedrockClient::new(&config(Some(creds()), Some(&base))).unwrap();
        let failures_before = counter_value("bedrock_failures_total");

        match client.invoke("hi", 200).await {
            Err(BedrockError::Api { status, message }) => {
                assert_eq!(status, 429);
                assert!(message.contains("Too many requests"));
            }
            other => panic!("expected an API error, got {other:?}"),
        }
        assert!(counter_value("bedrock_failures_total") >= failures_before + 1.0);
    }

    #[tokio::test]
    async fn test_reply_without_text_is_unexpected() {
        let base = spawn_runtime(FakeRuntime {
            status: StatusCode::OK,
            reply: json!({"content": []}),
            seen: Arc::new(Mutex::new(Vec::new())),
        })
        .await;

        let client = BedrockClient::new(&config(Some(creds()), Some(&base))).unwrap();
        assert!(matches!(
            client.invoke("hi", 200).await,
            Err(BedrockError::Unexpected(_))
        ));
    }
}
