//! Shared harness for integration tests.
//!
//! Wires the controller, pipeline and scheduler to scripted mock providers,
//! a configurable availability stub, stub pricing, and a counting mailer,
//! all against tempdir-backed stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use llm_client::{MockProvider, Provider};
use rdap_client::DomainCheck;
use search_core::domains::search::{JobController, JobStatus, QuizResponses};
use search_core::kernel::traits::{
    AvailabilityChecker, DomainPrice, Mailer, PricingService, ProviderFactory,
};
use search_core::kernel::{IndexStore, SearchDeps, SearchScheduler, StoreManager, StreamHub};
use search_core::Config;
use tempfile::TempDir;

/// How the stub checker answers.
#[derive(Debug, Clone, Copy)]
pub enum CheckerMode {
    AllAvailable,
    /// First N of each request are available, the rest registered
    AvailablePrefix(usize),
    AllRegistered,
    /// Adapter-level fault (fails the batch)
    Fail,
}

pub struct StubChecker {
    mode: CheckerMode,
}

#[async_trait]
impl AvailabilityChecker for StubChecker {
    async fn check_bulk(&self, domains: &[String]) -> Result<Vec<DomainCheck>> {
        match self.mode {
            CheckerMode::Fail => anyhow::bail!("availability adapter exploded"),
            CheckerMode::AllAvailable => {
                Ok(domains.iter().map(|d| DomainCheck::available(d.clone())).collect())
            }
            CheckerMode::AllRegistered => Ok(domains
                .iter()
                .map(|d| {
                    let mut check = DomainCheck::registered(d.clone());
                    check.registrar = Some("Stub Registrar".to_string());
                    check
                })
                .collect()),
            CheckerMode::AvailablePrefix(n) => Ok(domains
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    if i < n {
                        DomainCheck::available(d.clone())
                    } else {
                        DomainCheck::registered(d.clone())
                    }
                })
                .collect()),
        }
    }
}

/// Prices every domain at a flat rate.
pub struct StubPricing {
    pub price_cents: i64,
}

#[async_trait]
impl PricingService for StubPricing {
    async fn bulk(&self, domains: &[String]) -> Result<HashMap<String, DomainPrice>> {
        Ok(domains
            .iter()
            .map(|d| {
                (
                    d.to_lowercase(),
                    DomainPrice {
                        price_cents: self.price_cents,
                        renewal_cents: Some(self.price_cents + 500),
                    },
                )
            })
            .collect())
    }
}

/// Counts deliveries instead of sending anything.
#[derive(Default)]
pub struct CountingMailer {
    pub results_sent: AtomicUsize,
    pub followups_sent: AtomicUsize,
}

#[async_trait]
impl Mailer for CountingMailer {
    async fn send_results_ready(&self, _to: &str, _job_id: &str, _good: i64) -> Result<()> {
        self.results_sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_followup_request(&self, _to: &str, _job_id: &str) -> Result<()> {
        self.followups_sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fixed providers for both roles.
pub struct FixedProviders {
    driver: Arc<Provider>,
    swarm: Arc<Provider>,
}

impl ProviderFactory for FixedProviders {
    fn driver(&self, _override_name: Option<&str>) -> Result<Arc<Provider>> {
        Ok(self.driver.clone())
    }

    fn swarm(&self, _override_name: Option<&str>) -> Result<Arc<Provider>> {
        Ok(self.swarm.clone())
    }
}

pub struct Harness {
    pub deps: Arc<SearchDeps>,
    pub controller: JobController,
    pub scheduler: SearchScheduler,
    pub mailer: Arc<CountingMailer>,
    dir: TempDir,
}

pub struct HarnessBuilder {
    driver: MockProvider,
    swarm: MockProvider,
    checker: CheckerMode,
    alarm_delay_secs: u64,
    max_batches: i64,
    target_results: i64,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            driver: MockProvider::new(),
            swarm: MockProvider::new().with_eval_score(0.9),
            checker: CheckerMode::AllAvailable,
            alarm_delay_secs: 0,
            max_batches: 6,
            target_results: 25,
        }
    }

    pub fn driver(mut self, driver: MockProvider) -> Self {
        self.driver = driver;
        self
    }

    pub fn swarm(mut self, swarm: MockProvider) -> Self {
        self.swarm = swarm;
        self
    }

    pub fn checker(mut self, mode: CheckerMode) -> Self {
        self.checker = mode;
        self
    }

    pub fn alarm_delay_secs(mut self, secs: u64) -> Self {
        self.alarm_delay_secs = secs;
        self
    }

    pub fn target_results(mut self, target: i64) -> Self {
        self.target_results = target;
        self
    }

    pub async fn build(self) -> Harness {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::defaults(dir.path());
        config.alarm_delay_secs = self.alarm_delay_secs;
        config.max_batches = self.max_batches;
        config.target_results = self.target_results;

        let mailer = Arc::new(CountingMailer::default());
        let deps = Arc::new(SearchDeps::new(
            config,
            StoreManager::new(dir.path()),
            IndexStore::open(dir.path()).await.expect("index store"),
            Arc::new(FixedProviders {
                driver: Arc::new(Provider::Mock(self.driver)),
                swarm: Arc::new(Provider::Mock(self.swarm)),
            }),
            Arc::new(StubChecker { mode: self.checker }),
            Arc::new(StubPricing { price_cents: 1200 }),
            mailer.clone(),
            StreamHub::new(),
        ));

        Harness {
            controller: JobController::new(deps.clone()),
            scheduler: SearchScheduler::new(deps.clone()),
            mailer,
            deps,
            dir,
        }
    }
}

impl Harness {
    /// Simulate a process restart: fresh deps over the same data directory.
    pub async fn restart(self) -> Harness {
        let Harness { deps, dir, mailer, .. } = self;
        let config = deps.config.clone();
        drop(deps);

        let new_deps = Arc::new(SearchDeps::new(
            config,
            StoreManager::new(dir.path()),
            IndexStore::open(dir.path()).await.expect("index store"),
            Arc::new(FixedProviders {
                driver: Arc::new(Provider::mock()),
                swarm: Arc::new(Provider::mock()),
            }),
            Arc::new(StubChecker {
                mode: CheckerMode::AllAvailable,
            }),
            Arc::new(StubPricing { price_cents: 1200 }),
            mailer.clone(),
            StreamHub::new(),
        ));

        Harness {
            controller: JobController::new(new_deps.clone()),
            scheduler: SearchScheduler::new(new_deps.clone()),
            mailer,
            deps: new_deps,
            dir,
        }
    }

    pub fn quiz() -> QuizResponses {
        QuizResponses {
            business_name: "Sunrise Bakery".into(),
            tld_preferences: vec!["com".into(), "co".into(), "io".into()],
            vibe: "creative".into(),
            client_email: Some("owner@sunrisebakery.test".into()),
            ..Default::default()
        }
    }

    pub async fn start_job(&self, job_id: &str) {
        self.controller
            .start(job_id, "client-1", Self::quiz(), None, None)
            .await
            .expect("start job");
    }

    /// Fire timers until the job leaves running (or the fuel runs out).
    pub async fn run_until_settled(&self, job_id: &str) -> JobStatus {
        for _ in 0..40 {
            self.scheduler.fire_due_jobs().await;

            let snapshot = self.controller.status(job_id).await.expect("status");
            if snapshot.status != JobStatus::Running {
                return snapshot.status;
            }
        }

        self.controller.status(job_id).await.expect("status").status
    }
}

/// 30 short candidates that score well and dedup cleanly.
pub fn scripted_domains(count: usize) -> Vec<String> {
    let bases = [
        "sunrise", "sunup", "dawnly", "bakeco", "ovenly", "crumb", "rised", "bakery",
        "morning", "golden",
    ];
    let tlds = ["com", "co", "io"];

    let mut out = Vec::new();
    for tld in tlds {
        for base in bases {
            out.push(format!("{base}.{tld}"));
            if out.len() == count {
                return out;
            }
        }
    }
    out
}

/// JSON reply carrying the given domains.
pub fn generation_reply(domains: &[String]) -> String {
    serde_json::json!({ "domains": domains }).to_string()
}
