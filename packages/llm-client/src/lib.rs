//! Multi-provider generative model client.
//!
//! A uniform interface over four hosted providers (Claude, DeepSeek, Kimi,
//! Cloudflare Workers AI) plus an offline mock. Providers differ only by
//! transport and wire vocabulary; the capability surface is `generate` and,
//! where `supports_tools()` holds, `generate_with_tools`.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_client::{GenerateRequest, Provider, ToolChoice, ToolDefinition};
//!
//! let provider = Provider::claude(api_key);
//!
//! let response = provider
//!     .generate_with_tools(
//!         &GenerateRequest::new(prompt).system(system).temperature(0.8),
//!         &[tool],
//!         &ToolChoice::Tool("generate_domain_candidates".into()),
//!     )
//!     .await?;
//! ```

pub mod claude;
pub mod cloudflare;
pub mod error;
pub mod mock;
pub mod openai_compat;
pub mod tools;
pub mod types;

pub use claude::ClaudeClient;
pub use cloudflare::CloudflareClient;
pub use error::{ProviderError, Result};
pub use mock::{MockProvider, ScriptStep};
pub use openai_compat::OpenAiCompatClient;
pub use tools::{ToolChoice, ToolDefinition};
pub use types::{GenerateRequest, ModelResponse, ToolCall, Usage};

/// A concrete provider, tagged by vendor.
pub enum Provider {
    Claude(ClaudeClient),
    DeepSeek(OpenAiCompatClient),
    Kimi(OpenAiCompatClient),
    Cloudflare(CloudflareClient),
    Mock(MockProvider),
}

impl Provider {
    pub fn claude(api_key: impl Into<String>) -> Self {
        Provider::Claude(ClaudeClient::new(api_key))
    }

    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Provider::DeepSeek(OpenAiCompatClient::deepseek(api_key))
    }

    pub fn kimi(api_key: impl Into<String>) -> Self {
        Provider::Kimi(OpenAiCompatClient::kimi(api_key))
    }

    pub fn cloudflare(api_token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Provider::Cloudflare(CloudflareClient::new(api_token, account_id))
    }

    pub fn mock() -> Self {
        Provider::Mock(MockProvider::new())
    }

    /// Provider name as used in configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Claude(_) => "claude",
            Provider::DeepSeek(_) => "deepseek",
            Provider::Kimi(_) => "kimi",
            Provider::Cloudflare(_) => "cloudflare",
            Provider::Mock(_) => "mock",
        }
    }

    /// Default model for this provider.
    pub fn default_model(&self) -> &str {
        match self {
            Provider::Claude(c) => c.default_model(),
            Provider::DeepSeek(c) | Provider::Kimi(c) => c.default_model(),
            Provider::Cloudflare(c) => c.default_model(),
            Provider::Mock(c) => c.default_model(),
        }
    }

    /// Whether `generate_with_tools` is available.
    pub fn supports_tools(&self) -> bool {
        match self {
            Provider::Claude(_)
            | Provider::DeepSeek(_)
            | Provider::Kimi(_)
            | Provider::Cloudflare(_) => true,
            Provider::Mock(m) => m.supports_tools(),
        }
    }

    /// Approximate cost per million tokens (input, output) in USD.
    pub fn cost_per_mtok(&self) -> (f64, f64) {
        match self {
            Provider::Claude(_) => (3.00, 15.00),
            Provider::DeepSeek(_) => (0.28, 0.42),
            Provider::Kimi(_) => (0.60, 2.50),
            Provider::Cloudflare(_) => (0.27, 0.85),
            Provider::Mock(_) => (0.0, 0.0),
        }
    }

    /// Generate a plain completion.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<ModelResponse> {
        match self {
            Provider::Claude(c) => c.generate(request).await,
            Provider::DeepSeek(c) | Provider::Kimi(c) => c.generate(request).await,
            Provider::Cloudflare(c) => c.generate(request).await,
            Provider::Mock(c) => c.generate(request).await,
        }
    }

    /// Generate with tool calling.
    ///
    /// Fails with `ToolsUnsupported` when the provider lacks the capability;
    /// callers are expected to check `supports_tools()` and fall back to a
    /// plain `generate` with a JSON-output prompt.
    pub async fn generate_with_tools(
        &self,
        request: &GenerateRequest,
        tools: &[ToolDefinition],
        tool_choice: &ToolChoice,
    ) -> Result<ModelResponse> {
        match self {
            Provider::Claude(c) => c.generate_with_tools(request, tools, tool_choice).await,
            Provider::DeepSeek(c) | Provider::Kimi(c) => {
                c.generate_with_tools(request, tools, tool_choice).await
            }
            Provider::Cloudflare(c) => c.generate_with_tools(request, tools, tool_choice).await,
            Provider::Mock(m) => {
                if !m.supports_tools() {
                    return Err(ProviderError::ToolsUnsupported("mock"));
                }
                m.generate(request).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names_and_capabilities() {
        let claude = Provider::claude("sk-test");
        assert_eq!(claude.name(), "claude");
        assert!(claude.supports_tools());

        let kimi = Provider::kimi("key");
        assert_eq!(kimi.default_model(), openai_compat::KIMI_DEFAULT_MODEL);

        let mock = Provider::mock();
        assert!(!mock.supports_tools());
        assert_eq!(mock.cost_per_mtok(), (0.0, 0.0));
    }

    #[tokio::test]
    async fn test_mock_without_tools_refuses_tool_path() {
        let mock = Provider::mock();
        let err = mock
            .generate_with_tools(
                &GenerateRequest::new("x"),
                &[],
                &ToolChoice::Auto,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::ToolsUnsupported(_)));
    }
}
