//! Anthropic Claude client.
//!
//! Talks to the Messages API directly. Supports tool use via Anthropic's
//! `tools` / `tool_choice` request fields.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};
use crate::tools::{ToolChoice, ToolDefinition};
use crate::types::{GenerateRequest, ModelResponse, ToolCall, Usage};

const BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Client for the Anthropic Messages API.
#[derive(Clone)]
pub struct ClaudeClient {
    http_client: reqwest::Client,
    api_key: String,
    default_model: String,
    base_url: String,
}

impl ClaudeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key: api_key.into(),
            default_model: DEFAULT_MODEL.to_string(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Override the default model.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Override the base URL (proxies, test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<ModelResponse> {
        self.send(self.build_body(request, None, None)).await
    }

    pub async fn generate_with_tools(
        &self,
        request: &GenerateRequest,
        tools: &[ToolDefinition],
        tool_choice: &ToolChoice,
    ) -> Result<ModelResponse> {
        self.send(self.build_body(request, Some(tools), Some(tool_choice)))
            .await
    }

    fn build_body(
        &self,
        request: &GenerateRequest,
        tools: Option<&[ToolDefinition]>,
        tool_choice: Option<&ToolChoice>,
    ) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.default_model);

        let mut body = json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "messages": [{"role": "user", "content": request.prompt}],
            // The Messages API uses a 0-1 temperature scale
            "temperature": request.temperature.clamp(0.0, 1.0),
        });

        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if let Some(tools) = tools {
            body["tools"] = Value::Array(tools.iter().map(|t| t.to_anthropic()).collect());
        }
        if let Some(choice) = tool_choice {
            body["tool_choice"] = choice.to_anthropic();
        }

        body
    }

    async fn send(&self, body: Value) -> Result<ModelResponse> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Claude request failed");
                ProviderError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Claude API error");
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let parsed = parse_message(&value)?;
        debug!(
            model = %parsed.model,
            duration_ms = start.elapsed().as_millis() as u64,
            tool_calls = parsed.tool_calls.len(),
            "Claude completion"
        );

        Ok(parsed)
    }
}

/// Parse a Messages API response body.
///
/// Content blocks of type `text` concatenate into `content`; `tool_use`
/// blocks become tool calls with their already-structured `input`.
fn parse_message(value: &Value) -> Result<ModelResponse> {
    let mut content = String::new();
    let mut tool_calls = Vec::new();

    let blocks = value
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| ProviderError::Parse("missing content blocks".into()))?;

    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                    content.push_str(text);
                }
            }
            Some("tool_use") => {
                tool_calls.push(ToolCall {
                    name: block
                        .get("name")
                        .and_then(|n| n.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    arguments: block.get("input").cloned().unwrap_or(Value::Null),
                });
            }
            _ => {}
        }
    }

    let usage = Usage {
        input_tokens: value["usage"]["input_tokens"].as_u64().unwrap_or(0),
        output_tokens: value["usage"]["output_tokens"].as_u64().unwrap_or(0),
    };

    Ok(ModelResponse {
        content,
        model: value
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string(),
        provider: "claude",
        usage,
        tool_calls,
    })
}
