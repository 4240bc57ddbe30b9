//! Request and response types shared by all providers.

use serde::{Deserialize, Serialize};

/// A generation request.
///
/// Carries the prompt plus the knobs every provider understands. Providers
/// translate this into their own wire format.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// The user prompt
    pub prompt: String,

    /// Optional system prompt
    pub system: Option<String>,

    /// Model override (provider default if not set)
    pub model: Option<String>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl GenerateRequest {
    /// Create a request with default knobs (4096 tokens, temperature 0.7).
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            model: None,
            max_tokens: 4096,
            temperature: 0.7,
        }
    }

    /// Set the system prompt.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Override the model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set max tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Token usage for a single call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A tool invocation returned by the model, with parsed JSON arguments.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Name of the invoked tool
    pub name: String,

    /// Parsed arguments
    pub arguments: serde_json::Value,
}

/// Response from a provider.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// Text content (may be empty when the model only called a tool)
    pub content: String,

    /// The model that produced the response
    pub model: String,

    /// Provider name
    pub provider: &'static str,

    /// Token usage (zeroed when the provider omits it)
    pub usage: Usage,

    /// Tool calls, if any
    pub tool_calls: Vec<ToolCall>,
}

impl ModelResponse {
    /// Whether the response contains at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Arguments of the first call to the named tool, if present.
    pub fn tool_arguments(&self, tool_name: &str) -> Option<&serde_json::Value> {
        self.tool_calls
            .iter()
            .find(|tc| tc.name == tool_name)
            .map(|tc| &tc.arguments)
    }
}
