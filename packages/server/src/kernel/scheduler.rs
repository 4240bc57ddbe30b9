//! Timer emulation: persisted wake-ups plus a polling ticker.
//!
//! There is no per-job alarm primitive here, so each job persists its next
//! wake-up time and this ticker fires any job whose time has passed. Firing
//! is serialised per job; a fire that observes a terminal or non-running
//! state exits without work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::domains::search::JobController;

use super::deps::SearchDeps;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fallback poll cadence; delay-0 arms nudge the ticker sooner.
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Background ticker that drives due jobs through their next batch.
pub struct SearchScheduler {
    deps: Arc<SearchDeps>,
    controller: JobController,
    config: SchedulerConfig,
    shutdown: Arc<AtomicBool>,
}

impl SearchScheduler {
    pub fn new(deps: Arc<SearchDeps>) -> Self {
        let controller = JobController::new(deps.clone());
        Self {
            deps,
            controller,
            config: SchedulerConfig::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Handle for graceful shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run until shutdown is requested.
    pub async fn run(self) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "search scheduler starting"
        );

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            self.fire_due_jobs().await;

            tokio::select! {
                _ = self.deps.wake_notify.notified() => {
                    debug!("scheduler nudged for immediate execution");
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("search scheduler stopped");
    }

    /// Fire every job whose persisted wake-up has passed.
    ///
    /// Jobs are processed one at a time behind their per-job lock, so a
    /// slow batch never interleaves with another firing of the same job.
    pub async fn fire_due_jobs(&self) {
        let due = match self.deps.index.due_jobs(Utc::now()).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "failed to scan for due jobs");
                return;
            }
        };

        for job_id in due {
            let lock = self.deps.job_lock(&job_id).await;
            let _guard = lock.lock().await;

            debug!(job_id, "timer fired");
            if let Err(e) = self.controller.on_timer_fire(&job_id).await {
                // on_timer_fire already folds pipeline faults into the job
                // row; an error here is infrastructure (store unreachable)
                error!(job_id, error = %e, "timer handling failed");
            }
        }
    }

    /// Run with a Ctrl+C handler installed.
    pub async fn run_until_shutdown(self) {
        let shutdown = self.shutdown_handle();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
            shutdown.store(true, Ordering::SeqCst);
        });

        self.run().await
    }
}
