use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use verso_core::errors::GatewayError;
use verso_core::provider::{CompletionRequest, LlmProvider};
use verso_core::security::ApiKey;

use crate::models;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Connection settings for the Messages API.
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    pub api_key: ApiKey,
    /// Unknown names are sent as-is; `None` uses the default model.
    pub model: Option<String>,
    pub api_url: String,
    /// No deadline is applied unless the caller sets one.
    pub request_timeout: Option<Duration>,
}

impl AnthropicConfig {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            model: None,
            api_url: API_URL.to_string(),
            request_timeout: None,
        }
    }
}

pub struct AnthropicProvider {
    client: Client,
    api_key: ApiKey,
    api_url: String,
    model: String,
    max_output: u32,
    request_timeout: Option<Duration>,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self, GatewayError> {
        let mut builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GatewayError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;

        let (model, max_output) = match config.model.as_deref() {
            Some(name) => match models::find_model(name) {
                Some(info) => (info.name.to_string(), info.max_output),
                None => (name.to_string(), DEFAULT_MAX_TOKENS),
            },
            None => {
                let info = models::default_model();
                (info.name.to_string(), info.max_output)
            }
        };

        Ok(Self {
            client,
            api_key: config.api_key,
            api_url: config.api_url,
            model,
            max_output,
            request_timeout: config.request_timeout,
        })
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let max_tokens = request
            .max_tokens
            .unwrap_or(DEFAULT_MAX_TOKENS)
            .min(self.max_output);

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": request.prompt}],
        });
        if let Some(system) = &request.system {
            body["system"] = serde_json::Value::String(system.clone());
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        body
    }

    fn map_send_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.request_timeout.unwrap_or(CONNECT_TIMEOUT))
        } else {
            GatewayError::NetworkError(e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Extract the first text block; anything else fails closed.
fn parse_response(body: &str) -> Result<String, GatewayError> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::InvalidResponse(format!("unexpected body: {e}")))?;

    debug!(stop_reason = ?parsed.stop_reason, blocks = parsed.content.len(), "completion received");

    parsed
        .content
        .into_iter()
        .find_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .ok_or_else(|| GatewayError::InvalidResponse("response has no text block".into()))
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model, prompt_len = request.prompt.len()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
        let resp = self
            .client
            .post(&self.api_url)
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(GatewayError::from_status(status.as_u16(), body));
        }

        parse_response(&body)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provider_for(server: &MockServer) -> AnthropicProvider {
        let mut config = AnthropicConfig::new(ApiKey::new("sk-test"));
        config.api_url = format!("{}/v1/messages", server.uri());
        AnthropicProvider::new(config).unwrap()
    }

    #[test]
    fn parse_first_text_block() {
        let body = r#"{"content":[{"type":"thinking","thinking":"..."},{"type":"text","text":"hello"}],"stop_reason":"end_turn"}"#;
        assert_eq!(parse_response(body).unwrap(), "hello");
    }

    #[test]
    fn parse_without_text_fails_closed() {
        let body = r#"{"content":[{"type":"tool_use","id":"x","name":"y","input":{}}]}"#;
        assert!(matches!(parse_response(body), Err(GatewayError::InvalidResponse(_))));
        assert!(matches!(parse_response("not json"), Err(GatewayError::InvalidResponse(_))));
    }

    #[test]
    fn body_clamps_max_tokens_and_sets_options() {
        let mut config = AnthropicConfig::new(ApiKey::new("k"));
        config.model = Some("claude-opus-4-1-20250805".into());
        let provider = AnthropicProvider::new(config).unwrap();

        let request = CompletionRequest::new("hi")
            .with_system("sys")
            .with_max_tokens(1_000_000)
            .with_temperature(0.5);
        let body = provider.build_body(&request);
        assert_eq!(body["max_tokens"], 32_000);
        assert_eq!(body["system"], "sys");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["temperature"], 0.5);
    }

    #[test]
    fn unknown_model_passed_through() {
        let mut config = AnthropicConfig::new(ApiKey::new("k"));
        config.model = Some("custom-model".into());
        let provider = AnthropicProvider::new(config).unwrap();
        assert_eq!(provider.model(), "custom-model");
    }

    #[tokio::test]
    async fn complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "quiet river"}],
                "stop_reason": "end_turn"
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let text = provider.complete(&CompletionRequest::new("poem")).await.unwrap();
        assert_eq!(text, "quiet river");
    }

    #[tokio::test]
    async fn complete_maps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider.complete(&CompletionRequest::new("poem")).await.unwrap_err();
        assert!(matches!(err, GatewayError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn complete_rejects_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"oops": true})))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider.complete(&CompletionRequest::new("poem")).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }
}
