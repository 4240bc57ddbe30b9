//! Shared dependency bundle for the search service.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use llm_client::Provider;
use tokio::sync::Notify;

use crate::config::Config;
use crate::kernel::store::{IndexStore, StoreManager};
use crate::kernel::stream_hub::StreamHub;
use crate::kernel::traits::{AvailabilityChecker, Mailer, PricingService, ProviderFactory};

/// Everything the controller, pipeline and scheduler need.
///
/// Constructed once at startup (or per test) and shared behind an `Arc`.
pub struct SearchDeps {
    pub config: Config,
    pub stores: StoreManager,
    pub index: IndexStore,
    pub providers: Arc<dyn ProviderFactory>,
    pub checker: Arc<dyn AvailabilityChecker>,
    pub pricing: Arc<dyn PricingService>,
    pub mailer: Arc<dyn Mailer>,
    pub stream_hub: StreamHub,

    /// Nudges the scheduler when a timer is armed with delay 0.
    pub wake_notify: Notify,

    // One logical thread per job: the scheduler and RPC handlers that run
    // batches serialise behind these.
    job_locks: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SearchDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        stores: StoreManager,
        index: IndexStore,
        providers: Arc<dyn ProviderFactory>,
        checker: Arc<dyn AvailabilityChecker>,
        pricing: Arc<dyn PricingService>,
        mailer: Arc<dyn Mailer>,
        stream_hub: StreamHub,
    ) -> Self {
        Self {
            config,
            stores,
            index,
            providers,
            checker,
            pricing,
            mailer,
            stream_hub,
            wake_notify: Notify::new(),
            job_locks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// The per-job execution lock.
    pub async fn job_lock(&self, job_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.job_locks.lock().await;
        locks
            .entry(job_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Production provider factory: builds clients from configured credentials
/// and caches them per provider name.
pub struct EnvProviderFactory {
    config: Config,
    cache: std::sync::Mutex<HashMap<String, Arc<Provider>>>,
}

impl EnvProviderFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cache: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn build(&self, name: &str, model_override: Option<&str>) -> Result<Provider> {
        let provider = match name {
            "claude" => {
                let key = self
                    .config
                    .anthropic_api_key
                    .clone()
                    .ok_or_else(|| anyhow!("ANTHROPIC_API_KEY not configured"))?;
                let mut client = llm_client::ClaudeClient::new(key);
                if let Some(model) = model_override {
                    client = client.with_default_model(model);
                }
                Provider::Claude(client)
            }
            "deepseek" => {
                let key = self
                    .config
                    .deepseek_api_key
                    .clone()
                    .ok_or_else(|| anyhow!("DEEPSEEK_API_KEY not configured"))?;
                let mut client = llm_client::OpenAiCompatClient::deepseek(key);
                if let Some(model) = model_override {
                    client = client.with_default_model(model);
                }
                Provider::DeepSeek(client)
            }
            "kimi" => {
                let key = self
                    .config
                    .kimi_api_key
                    .clone()
                    .ok_or_else(|| anyhow!("KIMI_API_KEY not configured"))?;
                let mut client = llm_client::OpenAiCompatClient::kimi(key);
                if let Some(model) = model_override {
                    client = client.with_default_model(model);
                }
                Provider::Kimi(client)
            }
            "cloudflare" => {
                let token = self
                    .config
                    .cloudflare_api_token
                    .clone()
                    .ok_or_else(|| anyhow!("CLOUDFLARE_API_TOKEN not configured"))?;
                let account = self
                    .config
                    .cloudflare_account_id
                    .clone()
                    .ok_or_else(|| anyhow!("CLOUDFLARE_ACCOUNT_ID not configured"))?;
                let mut client = llm_client::CloudflareClient::new(token, account);
                if let Some(model) = model_override {
                    client = client.with_default_model(model);
                }
                Provider::Cloudflare(client)
            }
            "mock" => Provider::mock(),
            other => return Err(anyhow!("unknown provider: {other}")),
        };

        Ok(provider)
    }

    fn get_cached(&self, name: &str, model_override: Option<&str>) -> Result<Arc<Provider>> {
        let cache_key = format!("{name}:{}", model_override.unwrap_or("default"));

        if let Some(provider) = self.cache.lock().expect("provider cache").get(&cache_key) {
            return Ok(provider.clone());
        }

        let provider = Arc::new(self.build(name, model_override)?);
        self.cache
            .lock()
            .expect("provider cache")
            .insert(cache_key, provider.clone());
        Ok(provider)
    }
}

impl ProviderFactory for EnvProviderFactory {
    fn driver(&self, override_name: Option<&str>) -> Result<Arc<Provider>> {
        let name = override_name.unwrap_or(&self.config.driver_provider);
        self.get_cached(name, self.config.driver_model.as_deref())
    }

    fn swarm(&self, override_name: Option<&str>) -> Result<Arc<Provider>> {
        let name = override_name.unwrap_or(&self.config.swarm_provider);
        self.get_cached(name, self.config.swarm_model.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let factory = EnvProviderFactory::new(Config::defaults("/tmp/x"));
        assert!(factory.build("gpt", None).is_err());
        assert!(!factory.is_known("gpt"));
        assert!(factory.is_known("deepseek"));
    }

    #[test]
    fn test_factory_requires_credentials() {
        let factory = EnvProviderFactory::new(Config::defaults("/tmp/x"));
        assert!(factory.build("claude", None).is_err());

        let mut config = Config::defaults("/tmp/x");
        config.anthropic_api_key = Some("sk-test".into());
        let factory = EnvProviderFactory::new(config);
        assert!(factory.build("claude", None).is_ok());
    }

    #[test]
    fn test_mock_provider_needs_no_credentials() {
        let factory = EnvProviderFactory::new(Config::defaults("/tmp/x"));
        let provider = factory.build("mock", None).unwrap();
        assert_eq!(provider.name(), "mock");
    }
}
