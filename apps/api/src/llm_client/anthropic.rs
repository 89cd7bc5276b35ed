//! Anthropic Messages API adapter.
//!
//! This client performs exactly one HTTP call per invocation. Retry and
//! escalation live in `pipeline::retry`; this layer only maps failures onto
//! the [`AiError`] taxonomy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EndpointConfig, LlmProvider, TextResponse};
use crate::errors::AiError;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default primary model for every pipeline endpoint.
pub const DEFAULT_PRIMARY_MODEL: &str = "claude-sonnet-4-5";
/// Default escalation target when the primary model fails.
pub const DEFAULT_FALLBACK_MODEL: &str = "claude-opus-4-1";

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    /// Extracts the text content from the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: Option<String>,
    url: String,
}

impl AnthropicClient {
    /// A missing key is not an error here: it surfaces as
    /// [`AiError::Config`] on the first call.
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            url: ANTHROPIC_API_URL.to_string(),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl LlmProvider for AnthropicClient {
    async fn call_text(
        &self,
        endpoint: &EndpointConfig,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<TextResponse, AiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::Config("ANTHROPIC_API_KEY is not set".to_string()))?;

        let request_body = AnthropicRequest {
            model: &endpoint.model,
            max_tokens: endpoint.max_tokens,
            temperature: endpoint.temperature,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = retry_after_ms(response.headers());
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(classify_status(status.as_u16(), message, retry_after_ms));
        }

        let parsed: MessagesResponse = response.json().await.map_err(transport_error)?;

        debug!(
            endpoint = %endpoint.id,
            model = %parsed.model,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "LLM call succeeded"
        );

        let content = parsed
            .text()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AiError::api("LLM returned empty content"))?
            .to_string();

        Ok(TextResponse {
            content,
            model: parsed.model,
        })
    }
}

fn transport_error(e: reqwest::Error) -> AiError {
    if e.is_timeout() {
        AiError::Timeout(e.to_string())
    } else {
        AiError::api(e.to_string())
    }
}

fn classify_status(status: u16, message: String, retry_after_ms: Option<u64>) -> AiError {
    match status {
        429 => AiError::RateLimit {
            message,
            retry_after_ms,
        },
        401 | 403 => AiError::Config(format!("Anthropic rejected the credentials: {message}")),
        408 | 504 => AiError::Timeout(message),
        _ => AiError::Api {
            status: Some(status),
            message,
        },
    }
}

/// `Retry-After` in delta-seconds (fractions allowed). HTTP-date values are
/// ignored and fall back to computed backoff.
fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    let seconds: f64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| (seconds * 1000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::pipeline::schema::Schema;

    fn endpoint() -> EndpointConfig {
        EndpointConfig::new("job_description", "claude-test")
    }

    async fn client_for(server: &MockServer) -> AnthropicClient {
        AnthropicClient::new(Some("test-key".into()), Duration::from_secs(5))
            .unwrap()
            .with_url(format!("{}/v1/messages", server.uri()))
    }

    fn message_body(text: &str) -> serde_json::Value {
        json!({
            "model": "claude-test-20250101",
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": 12, "output_tokens": 34}
        })
    }

    #[tokio::test]
    async fn test_call_text_success_reports_served_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(message_body("hello")))
            .mount(&server)
            .await;

        let response = client_for(&server)
            .await
            .call_text(&endpoint(), "hi", None)
            .await
            .unwrap();

        assert_eq!(response.content, "hello");
        assert_eq!(response.model, "claude-test-20250101");
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "2")
                    .set_body_json(json!({"error": {"message": "Too many requests"}})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .call_text(&endpoint(), "hi", None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AiError::RateLimit {
                message: "Too many requests".into(),
                retry_after_ms: Some(2_000)
            }
        );
    }

    #[tokio::test]
    async fn test_unauthorized_is_config_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "invalid x-api-key"}})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .call_text(&endpoint(), "hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Config(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .call_text(&endpoint(), "hi", None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AiError::Api {
                status: Some(503),
                message: "overloaded".into()
            }
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let server = MockServer::start().await;
        let client = AnthropicClient::new(None, Duration::from_secs(5))
            .unwrap()
            .with_url(server.uri());

        let err = client.call_text(&endpoint(), "hi", None).await.unwrap_err();
        assert_eq!(err, AiError::Config("ANTHROPIC_API_KEY is not set".into()));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_call_json_parses_fenced_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(message_body("```json\n{\"title\": \"SRE\"}\n```")),
            )
            .mount(&server)
            .await;

        let schema = Schema::object().field("title", Schema::string());
        let response = client_for(&server)
            .await
            .call_json(&endpoint(), &schema, "hi", Some("system"))
            .await
            .unwrap();
        assert_eq!(response.data, json!({"title": "SRE"}));
    }

    #[test]
    fn test_retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_ms(&headers), None);
        headers.insert(RETRY_AFTER, "1.5".parse().unwrap());
        assert_eq!(retry_after_ms(&headers), Some(1_500));
        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert_eq!(retry_after_ms(&headers), None);
    }

    #[test]
    fn test_gateway_timeout_is_timeout() {
        assert!(matches!(
            classify_status(504, "upstream".into(), None),
            AiError::Timeout(_)
        ));
    }

    #[test]
    fn test_overloaded_status_is_retryable() {
        let err = classify_status(529, "overloaded".into(), None);
        assert_eq!(
            err,
            AiError::Api {
                status: Some(529),
                message: "overloaded".into()
            }
        );
        assert!(err.is_retryable());
    }
}
