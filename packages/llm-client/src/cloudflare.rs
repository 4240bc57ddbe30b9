//! Cloudflare Workers AI client.
//!
//! Uses the account-scoped `ai/run` REST endpoint. Responses wrap the model
//! output in `{success, result}`; token counts are not always reported.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};
use crate::tools::{ToolChoice, ToolDefinition};
use crate::types::{GenerateRequest, ModelResponse, ToolCall, Usage};

const BASE_URL: &str = "https://api.cloudflare.com/client/v4/accounts";

pub const DEFAULT_MODEL: &str = "@cf/meta/llama-4-scout-17b-16e-instruct";

/// Client for the Cloudflare Workers AI REST API.
#[derive(Clone)]
pub struct CloudflareClient {
    http_client: reqwest::Client,
    api_token: String,
    account_id: String,
    default_model: String,
    base_url: String,
}

impl CloudflareClient {
    pub fn new(api_token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_token: api_token.into(),
            account_id: account_id.into(),
            default_model: DEFAULT_MODEL.to_string(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Override the default model.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Override the base URL (test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn run_url(&self, model: &str) -> String {
        format!("{}/{}/ai/run/{}", self.base_url, self.account_id, model)
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<ModelResponse> {
        self.send(request, self.build_body(request, None)).await
    }

    pub async fn generate_with_tools(
        &self,
        request: &GenerateRequest,
        tools: &[ToolDefinition],
        _tool_choice: &ToolChoice,
    ) -> Result<ModelResponse> {
        // Workers AI has no tool_choice knob; offering the tools is the
        // strongest forcing available.
        self.send(request, self.build_body(request, Some(tools)))
            .await
    }

    fn build_body(&self, request: &GenerateRequest, tools: Option<&[ToolDefinition]>) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = json!({
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        if let Some(tools) = tools {
            body["tools"] = Value::Array(tools.iter().map(|t| t.to_openai()).collect());
        }

        body
    }

    async fn send(&self, request: &GenerateRequest, body: Value) -> Result<ModelResponse> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(self.run_url(&model))
            .bearer_auth(&self.api_token)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Cloudflare request failed");
                ProviderError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Cloudflare API error");
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let parsed = parse_run_response(&value, &model)?;
        debug!(
            model = %model,
            duration_ms = start.elapsed().as_millis() as u64,
            "Workers AI run"
        );

        Ok(parsed)
    }
}

/// Parse a Workers AI `ai/run` envelope.
fn parse_run_response(value: &Value, model: &str) -> Result<ModelResponse> {
    if !value.get("success").and_then(|s| s.as_bool()).unwrap_or(false) {
        let errors = value.get("errors").cloned().unwrap_or(Value::Null);
        return Err(ProviderError::Api {
            status: 200,
            message: format!("Workers AI run failed: {errors}"),
        });
    }

    let result = value
        .get("result")
        .ok_or_else(|| ProviderError::Parse("missing result".into()))?;

    let content = result
        .get("response")
        .and_then(|r| r.as_str())
        .unwrap_or_default()
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = result.get("tool_calls").and_then(|t| t.as_array()) {
        for tc in calls {
            let name = tc.get("name").and_then(|n| n.as_str()).unwrap_or_default();
            let arguments = match tc.get("arguments") {
                Some(Value::String(s)) => {
                    serde_json::from_str(s).unwrap_or_else(|_| json!({"raw": s}))
                }
                Some(v) => v.clone(),
                None => Value::Null,
            };
            tool_calls.push(ToolCall {
                name: name.to_string(),
                arguments,
            });
        }
    }

    let usage = Usage {
        input_tokens: result["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
        output_tokens: result["usage"]["completion_tokens"].as_u64().unwrap_or(0),
    };

    Ok(ModelResponse {
        content,
        model: model.to_string(),
        provider: "cloudflare",
        usage,
        tool_calls,
    })
}
