use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dotenvy::dotenv;

/// Application configuration loaded from environment variables.
///
/// Every search knob has a deployment default; provider credentials are
/// optional at load time and validated when a provider is first used.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub port: u16,

    // Search behavior
    pub max_batches: i64,
    pub candidates_per_batch: usize,
    pub target_results: i64,
    pub alarm_delay_secs: u64,

    // Evaluation fan-out
    pub eval_chunk_size: usize,
    pub eval_max_concurrent: usize,

    // Availability checking
    pub rdap_concurrency: usize,
    pub rdap_slot_ms: u64,

    // Provider selection (per-job overrides travel in /start)
    pub driver_provider: String,
    pub swarm_provider: String,
    pub driver_model: Option<String>,
    pub swarm_model: Option<String>,

    // Provider credentials
    pub anthropic_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub kimi_api_key: Option<String>,
    pub cloudflare_api_token: Option<String>,
    pub cloudflare_account_id: Option<String>,

    // Registrar pricing endpoint
    pub pricing_url: Option<String>,
    pub pricing_api_key: Option<String>,

    // Email notifications (Resend)
    pub resend_api_key: Option<String>,
    pub email_from: String,
}

impl Config {
    /// Deployment defaults rooted at `data_dir`, with no secrets.
    pub fn defaults(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            port: 8080,
            max_batches: 6,
            candidates_per_batch: 50,
            target_results: 25,
            alarm_delay_secs: 10,
            eval_chunk_size: 10,
            eval_max_concurrent: 12,
            rdap_concurrency: 5,
            rdap_slot_ms: 500,
            driver_provider: "claude".to_string(),
            swarm_provider: "claude".to_string(),
            driver_model: None,
            swarm_model: None,
            anthropic_api_key: None,
            deepseek_api_key: None,
            kimi_api_key: None,
            cloudflare_api_token: None,
            cloudflare_account_id: None,
            pricing_url: None,
            pricing_api_key: None,
            resend_api_key: None,
            email_from: "domains@example.com".to_string(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::warn_missing_vars();

        let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());
        let mut config = Self::defaults(data_dir);

        config.port = env_parse("PORT", config.port)?;
        config.max_batches = env_parse("MAX_BATCHES", config.max_batches)?;
        config.candidates_per_batch =
            env_parse("CANDIDATES_PER_BATCH", config.candidates_per_batch)?;
        config.target_results = env_parse("TARGET_RESULTS", config.target_results)?;
        config.alarm_delay_secs = env_parse("ALARM_DELAY", config.alarm_delay_secs)?;
        config.eval_chunk_size = env_parse("EVAL_CHUNK_SIZE", config.eval_chunk_size)?;
        config.eval_max_concurrent =
            env_parse("MAX_CONCURRENT_AI", config.eval_max_concurrent)?;
        config.rdap_concurrency = env_parse("MAX_CONCURRENT_RDAP", config.rdap_concurrency)?;
        config.rdap_slot_ms = env_parse("RDAP_SLOT_MS", config.rdap_slot_ms)?;

        if let Ok(provider) = env::var("DRIVER_PROVIDER") {
            config.driver_provider = provider;
        }
        if let Ok(provider) = env::var("SWARM_PROVIDER") {
            config.swarm_provider = provider;
        }
        config.driver_model = env::var("DRIVER_MODEL").ok().filter(|m| !m.is_empty());
        config.swarm_model = env::var("SWARM_MODEL").ok().filter(|m| !m.is_empty());

        config.anthropic_api_key = env::var("ANTHROPIC_API_KEY").ok();
        config.deepseek_api_key = env::var("DEEPSEEK_API_KEY").ok();
        config.kimi_api_key = env::var("KIMI_API_KEY").ok();
        config.cloudflare_api_token = env::var("CLOUDFLARE_API_TOKEN").ok();
        config.cloudflare_account_id = env::var("CLOUDFLARE_ACCOUNT_ID").ok();

        config.pricing_url = env::var("PRICING_URL").ok();
        config.pricing_api_key = env::var("PRICING_API_KEY").ok();

        config.resend_api_key = env::var("RESEND_API_KEY").ok();
        if let Ok(from) = env::var("EMAIL_FROM") {
            config.email_from = from;
        }

        Ok(config)
    }

    /// Warn about unset variables so deployments fail loudly, not quietly.
    fn warn_missing_vars() {
        let optional_vars = [
            ("DATA_DIR", "./data"),
            ("PORT", "8080"),
            ("MAX_BATCHES", "6"),
            ("TARGET_RESULTS", "25"),
            ("DRIVER_PROVIDER", "claude"),
            ("SWARM_PROVIDER", "claude"),
        ];

        for (var, default) in optional_vars {
            if env::var(var).is_err() {
                tracing::warn!("{} not set (default: {})", var, default);
            }
        }

        let has_any_provider_key = ["ANTHROPIC_API_KEY", "DEEPSEEK_API_KEY", "KIMI_API_KEY", "CLOUDFLARE_API_TOKEN"]
            .iter()
            .any(|var| env::var(var).is_ok());
        if !has_any_provider_key {
            tracing::error!(
                "No provider API key set; searches will fail unless jobs select the mock provider"
            );
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(var) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{var} must be a valid number")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::defaults("/tmp/search");
        assert_eq!(config.max_batches, 6);
        assert_eq!(config.target_results, 25);
        assert_eq!(config.candidates_per_batch, 50);
        assert_eq!(config.alarm_delay_secs, 10);
        assert_eq!(config.eval_chunk_size, 10);
        assert_eq!(config.eval_max_concurrent, 12);
        assert_eq!(config.rdap_concurrency, 5);
        assert_eq!(config.rdap_slot_ms, 500);
        assert_eq!(config.driver_provider, "claude");
    }
}
