//! Error types for the model client.

use thiserror::Error;

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Provider errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Configuration error (missing API key, unknown provider name)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// API error (non-2xx response, invalid request)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Authentication failed (HTTP 401/403)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Parse error (invalid JSON, unexpected response shape)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Tool calling requested from a provider that does not support it
    #[error("{0} provider does not support tool calling")]
    ToolsUnsupported(&'static str),
}

impl ProviderError {
    /// Map a non-2xx HTTP status to the matching error kind.
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => ProviderError::RateLimited(message),
            401 | 403 => ProviderError::Auth(message),
            _ => ProviderError::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Network(e.to_string())
    }
}
