//! OpenAI-compatible chat completions client.
//!
//! DeepSeek and Kimi (Moonshot) both speak the OpenAI chat-completions
//! dialect over bearer-token HTTP; they differ only in base URL and default
//! model, so a single client covers both.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};
use crate::tools::{ToolChoice, ToolDefinition};
use crate::types::{GenerateRequest, ModelResponse, ToolCall, Usage};

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";
pub const KIMI_BASE_URL: &str = "https://api.moonshot.cn/v1";
pub const KIMI_DEFAULT_MODEL: &str = "kimi-k2-0528";

/// Client for OpenAI-compatible chat completion APIs.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: String,
    provider: &'static str,
}

impl OpenAiCompatClient {
    /// Create a DeepSeek client.
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self::custom(api_key, DEEPSEEK_BASE_URL, DEEPSEEK_DEFAULT_MODEL, "deepseek")
    }

    /// Create a Kimi (Moonshot) client.
    pub fn kimi(api_key: impl Into<String>) -> Self {
        Self::custom(api_key, KIMI_BASE_URL, KIMI_DEFAULT_MODEL, "kimi")
    }

    /// Create a client against an arbitrary compatible endpoint.
    pub fn custom(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        provider: &'static str,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: default_model.into(),
            provider,
        }
    }

    /// Override the default model.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn provider(&self) -> &'static str {
        self.provider
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

        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        if let Some(tools) = tools {
            body["tools"] = Value::Array(tools.iter().map(|t| t.to_openai()).collect());
        }
        if let Some(choice) = tool_choice {
            body["tool_choice"] = choice.to_openai();
        }

        body
    }

    async fn send(&self, body: Value) -> Result<ModelResponse> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(provider = self.provider, error = %e, "request failed");
                ProviderError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(provider = self.provider, status = %status, error = %error_text, "API error");
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let parsed = parse_completion(&value, self.provider)?;
        debug!(
            provider = self.provider,
            model = %parsed.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "chat completion"
        );

        Ok(parsed)
    }
}

/// Parse an OpenAI-style chat completion body.
///
/// Tool call arguments arrive as a JSON *string*; an unparseable string is
/// preserved under a `raw` key rather than dropped.
fn parse_completion(value: &Value, provider: &'static str) -> Result<ModelResponse> {
    let message = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| ProviderError::Parse("missing choices[0].message".into()))?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|t| t.as_array()) {
        for tc in calls {
            let name = tc["function"]["name"].as_str().unwrap_or_default().to_string();
            let raw_args = tc["function"]["arguments"].as_str().unwrap_or("{}");
            let arguments = serde_json::from_str(raw_args)
                .unwrap_or_else(|_| json!({"raw": raw_args}));
            tool_calls.push(ToolCall { name, arguments });
        }
    }

    let usage = Usage {
        input_tokens: value["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
        output_tokens: value["usage"]["completion_tokens"].as_u64().unwrap_or(0),
    };

    Ok(ModelResponse {
        content,
        model: value
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string(),
        provider,
        usage,
        tool_calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_response() {
        let value = json!({
            "model": "deepseek-chat",
            "choices": [{"message": {"content": "{\"domains\": []}"}}],
            "usage": {"prompt_tokens": 90, "completion_tokens": 15}
        });

        let parsed = parse_completion(&value, "deepseek").unwrap();
        assert_eq!(parsed.content, "{\"domains\": []}");
        assert_eq!(parsed.usage.output_tokens, 15);
        assert_eq!(parsed.provider, "deepseek");
    }

    #[test]
    fn test_parse_tool_call_with_string_arguments() {
        let value = json!({
            "model": "kimi-k2-0528",
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "function": {
                            "name": "evaluate_domains",
                            "arguments": "{\"evaluations\": [{\"domain\": \"a.io\", \"score\": 0.7, \"worth_checking\": true}]}"
                        }
                    }]
                }
            }],
            "usage": {"prompt_tokens": 300, "completion_tokens": 120}
        });

        let parsed = parse_completion(&value, "kimi").unwrap();
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(
            parsed.tool_calls[0].arguments["evaluations"][0]["domain"],
            "a.io"
        );
    }

    #[test]
    fn test_parse_malformed_arguments_kept_raw() {
        let value = json!({
            "model": "deepseek-chat",
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "function": {"name": "t", "arguments": "not json"}
                    }]
                }
            }]
        });

        let parsed = parse_completion(&value, "deepseek").unwrap();
        assert_eq!(parsed.tool_calls[0].arguments["raw"], "not json");
    }

    #[test]
    fn test_system_prompt_first_in_messages() {
        let client = OpenAiCompatClient::deepseek("key");
        let request = GenerateRequest::new("hi").system("rules");
        let body = client.build_body(&request, None, None);

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["model"], DEEPSEEK_DEFAULT_MODEL);
    }
}
