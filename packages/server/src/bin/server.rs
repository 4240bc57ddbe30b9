// Main entry point for the domain search server

use std::sync::Arc;

use anyhow::{Context, Result};
use rdap_client::RdapClient;
use search_core::kernel::{
    EnvProviderFactory, IndexStore, NoopMailer, NoopPricing, RdapChecker, RegistrarPricing,
    ResendMailer, SearchDeps, SearchScheduler, StoreManager, StreamHub,
};
use search_core::kernel::traits::{Mailer, PricingService};
use search_core::server::build_app;
use search_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,search_core=debug,sqlx=warn,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting Domain Search Server");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(data_dir = %config.data_dir.display(), "Configuration loaded");

    let stores = StoreManager::new(&config.data_dir);
    let index = IndexStore::open(&config.data_dir)
        .await
        .context("Failed to open job index")?;

    let rdap = Arc::new(
        RdapClient::new()
            .with_concurrency(config.rdap_concurrency)
            .with_slot_interval(std::time::Duration::from_millis(config.rdap_slot_ms)),
    );

    let pricing: Arc<dyn PricingService> = match &config.pricing_url {
        Some(url) => Arc::new(RegistrarPricing::new(url.clone(), config.pricing_api_key.clone())),
        None => {
            tracing::warn!("PRICING_URL not set; prices will be unknown");
            Arc::new(NoopPricing)
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.resend_api_key {
        Some(key) => Arc::new(ResendMailer::new(key.clone(), config.email_from.clone())),
        None => {
            tracing::warn!("RESEND_API_KEY not set; email notifications disabled");
            Arc::new(NoopMailer)
        }
    };

    let providers = Arc::new(EnvProviderFactory::new(config.clone()));

    let deps = Arc::new(SearchDeps::new(
        config.clone(),
        stores,
        index,
        providers,
        Arc::new(RdapChecker::new(rdap)),
        pricing,
        mailer,
        StreamHub::new(),
    ));

    let scheduler = SearchScheduler::new(deps.clone());
    let shutdown = scheduler.shutdown_handle();
    let scheduler_handle = tokio::spawn(scheduler.run_until_shutdown());

    let app = build_app(deps);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Listening on {addr}");
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;

    shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    let _ = scheduler_handle.await;

    Ok(())
}
