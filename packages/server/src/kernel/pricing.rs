//! Registrar pricing client.
//!
//! One bulk POST per batch: `{"domains": [...]}` in, a map of per-domain
//! prices out. Pricing is best-effort; a missing entry or a failed request
//! never invalidates an availability verdict.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::traits::{DomainPrice, PricingService};

#[derive(Debug, Deserialize)]
struct BulkPricingResponse {
    #[serde(default)]
    prices: HashMap<String, DomainPrice>,
}

/// HTTP client for a registrar pricing endpoint.
pub struct RegistrarPricing {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RegistrarPricing {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl PricingService for RegistrarPricing {
    async fn bulk(&self, domains: &[String]) -> Result<HashMap<String, DomainPrice>> {
        if domains.is_empty() {
            return Ok(HashMap::new());
        }

        let mut request = self
            .http_client
            .post(&self.base_url)
            .json(&serde_json::json!({ "domains": domains }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.context("pricing request failed")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("pricing endpoint returned {}", status);
        }

        let body: BulkPricingResponse = response
            .json()
            .await
            .context("failed to parse pricing response")?;

        // Keys come back lowercased so lookups match stored domains
        let prices = body
            .prices
            .into_iter()
            .map(|(domain, price)| (domain.to_lowercase(), price))
            .collect::<HashMap<_, _>>();

        debug!(
            requested = domains.len(),
            priced = prices.len(),
            "bulk pricing fetched"
        );

        Ok(prices)
    }
}
