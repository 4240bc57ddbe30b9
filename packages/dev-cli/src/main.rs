//! Terminal front-end for the domain search core.
//!
//! Runs a bounded search inline (no server) and prints the ranked results.
//! `--mock` runs fully offline with the deterministic mock provider and a
//! hash-based availability stub; without it the configured providers and
//! live RDAP are used.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use rdap_client::{DomainCheck, RdapClient};
use search_core::domains::search::{JobController, JobStatus, QuizResponses};
use search_core::kernel::traits::{AvailabilityChecker, ProviderFactory};
use search_core::kernel::{
    EnvProviderFactory, IndexStore, NoopMailer, NoopPricing, RdapChecker, SearchDeps,
    SearchScheduler, StoreManager, StreamHub,
};
use search_core::Config;

#[derive(Parser)]
#[command(name = "domain-search")]
#[command(about = "Search for available domain names from the terminal")]
#[command(version)]
struct Cli {
    /// Business or project name
    business_name: String,

    /// Brand vibe (professional, creative, minimal, bold, personal)
    #[arg(long, default_value = "professional")]
    vibe: String,

    /// Preferred TLDs, comma separated
    #[arg(long, default_value = "com,co,io")]
    tlds: String,

    /// Keywords or themes to explore
    #[arg(long)]
    keywords: Option<String>,

    /// Number of batches to run
    #[arg(long, default_value_t = 2)]
    max_batches: i64,

    /// Run offline with mock providers and stubbed availability
    #[arg(long)]
    mock: bool,
}

/// Offline availability: stable per domain, roughly half available.
struct HashChecker;

#[async_trait]
impl AvailabilityChecker for HashChecker {
    async fn check_bulk(&self, domains: &[String]) -> Result<Vec<DomainCheck>> {
        Ok(domains
            .iter()
            .map(|domain| {
                let sum: u32 = domain.bytes().map(u32::from).sum();
                if sum % 2 == 0 {
                    DomainCheck::available(domain.clone())
                } else {
                    DomainCheck::registered(domain.clone())
                }
            })
            .collect())
    }
}

/// Mock provider for both agent roles.
struct MockFactory;

impl ProviderFactory for MockFactory {
    fn driver(&self, _override_name: Option<&str>) -> Result<Arc<llm_client::Provider>> {
        Ok(Arc::new(llm_client::Provider::mock()))
    }

    fn swarm(&self, _override_name: Option<&str>) -> Result<Arc<llm_client::Provider>> {
        Ok(Arc::new(llm_client::Provider::mock()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let workdir = tempfile::tempdir().context("failed to create working directory")?;
    let mut config = if cli.mock {
        Config::defaults(workdir.path())
    } else {
        let mut config = Config::from_env()?;
        config.data_dir = workdir.path().to_path_buf();
        config
    };
    config.max_batches = cli.max_batches;
    config.alarm_delay_secs = 0;

    let stores = StoreManager::new(&config.data_dir);
    let index = IndexStore::open(&config.data_dir).await?;

    let providers: Arc<dyn ProviderFactory> = if cli.mock {
        Arc::new(MockFactory)
    } else {
        Arc::new(EnvProviderFactory::new(config.clone()))
    };
    let checker: Arc<dyn AvailabilityChecker> = if cli.mock {
        Arc::new(HashChecker)
    } else {
        Arc::new(RdapChecker::new(Arc::new(
            RdapClient::new()
                .with_concurrency(config.rdap_concurrency)
                .with_slot_interval(Duration::from_millis(config.rdap_slot_ms)),
        )))
    };

    let deps = Arc::new(SearchDeps::new(
        config,
        stores,
        index,
        providers,
        checker,
        Arc::new(NoopPricing),
        Arc::new(NoopMailer),
        StreamHub::new(),
    ));

    let controller = JobController::new(deps.clone());
    let scheduler = SearchScheduler::new(deps.clone());

    let quiz = QuizResponses {
        business_name: cli.business_name.clone(),
        tld_preferences: cli.tlds.split(',').map(|t| t.trim().to_string()).collect(),
        vibe: cli.vibe.clone(),
        keywords: cli.keywords.clone(),
        ..Default::default()
    };

    println!("Searching domains for \"{}\" ({} vibe)...", cli.business_name, cli.vibe);
    controller
        .start("cli-search", "cli", quiz, None, None)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    // Drive batches inline until the job settles
    loop {
        scheduler.fire_due_jobs().await;

        let snapshot = controller
            .status("cli-search")
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        println!(
            "  batch {}: {} checked, {} available, {} good",
            snapshot.batch_num,
            snapshot.domains_checked,
            snapshot.domains_available,
            snapshot.good_results
        );

        if snapshot.status != JobStatus::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    print_results(&controller).await
}

async fn print_results(controller: &JobController) -> Result<()> {
    let results = controller
        .results("cli-search")
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!();
    if results.domains.is_empty() {
        println!("No available domains found. Try different TLDs or name variations.");
        return Ok(());
    }

    println!("{:<34} {:>6} {:>12} {:>12}", "DOMAIN", "SCORE", "PRICE", "CATEGORY");
    println!("{}", "-".repeat(68));
    for domain in &results.domains {
        println!(
            "{:<34} {:>6.2} {:>12} {:>12}",
            domain.domain,
            domain.score,
            domain.display_price,
            domain.price_category.as_str()
        );
    }

    println!();
    println!(
        "{} available domains • status: {:?} • tokens: {} in / {} out",
        results.domains.len(),
        results.status,
        results.total_input_tokens,
        results.total_output_tokens
    );

    Ok(())
}
