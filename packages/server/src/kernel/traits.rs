//! Dependency seams for the search kernel.
//!
//! The pipeline talks to the outside world only through these traits so
//! tests can swap in stubs. Production implementations live beside their
//! clients (`rdap-client`, `kernel/pricing.rs`, `kernel/email.rs`).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rdap_client::{DomainCheck, RdapClient};
use serde::{Deserialize, Serialize};

use llm_client::Provider;

/// Availability lookup over a batch of domains.
///
/// Per-domain lookup failures must fold into `DomainStatus::Unknown` inside
/// the returned checks; an `Err` from this method is an adapter-level fault
/// and fails the whole batch.
#[async_trait]
pub trait AvailabilityChecker: Send + Sync {
    async fn check_bulk(&self, domains: &[String]) -> Result<Vec<DomainCheck>>;
}

/// Production checker backed by RDAP.
pub struct RdapChecker {
    client: Arc<RdapClient>,
}

impl RdapChecker {
    pub fn new(client: Arc<RdapClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AvailabilityChecker for RdapChecker {
    async fn check_bulk(&self, domains: &[String]) -> Result<Vec<DomainCheck>> {
        Ok(self.client.check_bulk(domains).await)
    }
}

/// Registrar price for one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainPrice {
    pub price_cents: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_cents: Option<i64>,
}

/// Bulk registrar pricing. Missing entries are permitted; callers tolerate
/// an error by treating every price as unknown.
#[async_trait]
pub trait PricingService: Send + Sync {
    async fn bulk(&self, domains: &[String]) -> Result<HashMap<String, DomainPrice>>;
}

/// Pricing service for deployments without a registrar endpoint: every
/// price is unknown.
pub struct NoopPricing;

#[async_trait]
impl PricingService for NoopPricing {
    async fn bulk(&self, _domains: &[String]) -> Result<HashMap<String, DomainPrice>> {
        Ok(HashMap::new())
    }
}

/// Outbound notifications. Failures are logged and swallowed at call sites;
/// they never mutate job state.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_results_ready(&self, to: &str, job_id: &str, good_count: i64) -> Result<()>;

    async fn send_followup_request(&self, to: &str, job_id: &str) -> Result<()>;
}

/// Mailer for deployments without email configured.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send_results_ready(&self, _to: &str, _job_id: &str, _good_count: i64) -> Result<()> {
        Ok(())
    }

    async fn send_followup_request(&self, _to: &str, _job_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Builds providers for the two agent roles, honoring per-job overrides.
pub trait ProviderFactory: Send + Sync {
    /// Provider for the driver (generation) agent.
    fn driver(&self, override_name: Option<&str>) -> Result<Arc<Provider>>;

    /// Provider for the swarm (evaluation) agent.
    fn swarm(&self, override_name: Option<&str>) -> Result<Arc<Provider>>;

    /// Whether a provider name is recognized (used to reject bad `/start`
    /// bodies before a job row exists).
    fn is_known(&self, name: &str) -> bool {
        matches!(name, "claude" | "deepseek" | "kimi" | "cloudflare" | "mock")
    }
}
