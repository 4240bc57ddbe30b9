//! Job controller: lifecycle, transitions, timers.
//!
//! Every public operation is a transactional action against the job's own
//! store. The controller also owns the re-arm decision after each batch:
//! continue, complete, solicit follow-up, or record the failure.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::kernel::deps::SearchDeps;
use crate::kernel::store::JobIndexRow;
use crate::kernel::stream_hub::SearchEvent;

use super::artifacts::{ArtifactType, SearchArtifact};
use super::job::{JobStatus, QuizResponses, SearchJob};
use super::pipeline::{self, GOOD_SCORE};
use super::quiz::{validate_quiz, FollowupQuizGenerator};
use super::results::{DomainRecord, PriceCategory};

/// Operation errors, mapped to RPC status codes at the HTTP boundary.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("job already exists")]
    Conflict,

    #[error("job not found")]
    NotFound,

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// `/status` snapshot.
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub batch_num: i64,
    pub domains_checked: i64,
    pub domains_available: i64,
    pub good_results: i64,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub estimated_cost_usd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

/// One ranked entry in `/results`.
#[derive(Debug, Serialize)]
pub struct RankedDomain {
    pub domain: String,
    pub tld: String,
    pub score: f64,
    pub price_cents: Option<i64>,
    pub display_price: String,
    pub price_category: PriceCategory,
    pub batch_num: i64,
    pub flags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub domains: Vec<RankedDomain>,
    /// Count of results per pricing category
    pub pricing_histogram: std::collections::BTreeMap<String, i64>,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
}

/// `/stream` snapshot for SSE fan-out.
#[derive(Debug, Serialize)]
pub struct StreamSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub batch_num: i64,
    pub good_results: i64,
    pub recent_available: Vec<String>,
    /// Status of the client's own idea, when they supplied one and it has
    /// been checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_idea_status: Option<String>,
}

/// Identity returned by a successful `/start`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartedJob {
    pub job_id: String,
    pub client_id: String,
    pub status: JobStatus,
}

/// The controller. Cheap to clone; all state lives in the stores.
#[derive(Clone)]
pub struct JobController {
    deps: Arc<SearchDeps>,
}

impl JobController {
    pub fn new(deps: Arc<SearchDeps>) -> Self {
        Self { deps }
    }

    /// Create a job and arm an immediate timer. Conflict if the id exists.
    pub async fn start(
        &self,
        job_id: &str,
        client_id: &str,
        quiz: QuizResponses,
        driver_provider: Option<String>,
        swarm_provider: Option<String>,
    ) -> Result<StartedJob, ControllerError> {
        validate_job_id(job_id)?;
        validate_quiz(&quiz).map_err(ControllerError::InvalidInput)?;

        for provider in [&driver_provider, &swarm_provider].into_iter().flatten() {
            if !self.deps.providers.is_known(provider) {
                return Err(ControllerError::InvalidInput(format!(
                    "unknown provider: {provider}"
                )));
            }
        }

        if self.deps.stores.store_exists(job_id) {
            let pool = self.deps.stores.open(job_id).await.map_err(internal)?;
            if SearchJob::find(&pool).await.map_err(internal)?.is_some() {
                return Err(ControllerError::Conflict);
            }
        }

        let pool = self.deps.stores.open(job_id).await.map_err(internal)?;

        let business_name = quiz.business_name.clone();
        let job = SearchJob::builder()
            .id(job_id)
            .client_id(client_id)
            .status(JobStatus::Running)
            .batch_budget(self.deps.config.max_batches)
            .quiz_responses(Json(quiz));
        let job = match (driver_provider, swarm_provider) {
            (Some(driver), Some(swarm)) => job.driver_provider(driver).swarm_provider(swarm).build(),
            (Some(driver), None) => job.driver_provider(driver).build(),
            (None, Some(swarm)) => job.swarm_provider(swarm).build(),
            (None, None) => job.build(),
        };

        job.insert(&pool).await.map_err(|_| ControllerError::Conflict)?;

        self.deps
            .index
            .upsert(&JobIndexRow {
                job_id: job_id.to_string(),
                client_id: client_id.to_string(),
                status: JobStatus::Running,
                business_name,
                batch_num: 0,
                domains_checked: 0,
                good_results: 0,
                wake_at: None,
                created_at: job.created_at,
                updated_at: job.updated_at,
            })
            .await
            .map_err(internal)?;

        self.arm_timer(&pool, job_id, 0).await.map_err(internal)?;

        info!(job_id, client_id, "search job started");

        Ok(StartedJob {
            job_id: job_id.to_string(),
            client_id: client_id.to_string(),
            status: JobStatus::Running,
        })
    }

    /// Progress snapshot. Pure read.
    pub async fn status(&self, job_id: &str) -> Result<StatusSnapshot, ControllerError> {
        let (pool, job) = self.load(job_id).await?;

        let domains_checked = DomainRecord::checked_count(&pool).await.map_err(internal)?;
        let domains_available = DomainRecord::available_count(&pool).await.map_err(internal)?;
        let good_results = DomainRecord::good_count(&pool).await.map_err(internal)?;

        Ok(StatusSnapshot {
            job_id: job.id.clone(),
            status: job.status,
            batch_num: job.batch_num,
            domains_checked,
            domains_available,
            good_results,
            total_input_tokens: job.total_input_tokens,
            total_output_tokens: job.total_output_tokens,
            estimated_cost_usd: self.estimate_cost(&job),
            error: job.error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        })
    }

    /// Ranked available domains with pricing annotations.
    pub async fn results(&self, job_id: &str) -> Result<ResultsResponse, ControllerError> {
        let (pool, job) = self.load(job_id).await?;

        let ranked = DomainRecord::ranked_available(&pool, 50)
            .await
            .map_err(internal)?;

        let mut pricing_histogram = std::collections::BTreeMap::new();
        let domains: Vec<RankedDomain> = ranked
            .into_iter()
            .map(|record| {
                let category = record.price_category();
                *pricing_histogram
                    .entry(category.as_str().to_string())
                    .or_insert(0) += 1;

                let display_price = match record.price_dollars() {
                    Some(dollars) => format!("${dollars:.0}/yr"),
                    None => "—".to_string(),
                };

                RankedDomain {
                    tld: record.tld.clone(),
                    score: record.score,
                    price_cents: record.price_cents,
                    display_price,
                    price_category: category,
                    batch_num: record.batch_num,
                    flags: record.flags.0.clone(),
                    domain: record.domain,
                }
            })
            .collect();

        Ok(ResultsResponse {
            job_id: job.id,
            status: job.status,
            domains,
            pricing_histogram,
            total_input_tokens: job.total_input_tokens,
            total_output_tokens: job.total_output_tokens,
        })
    }

    /// The latest follow-up quiz artifact.
    pub async fn followup(&self, job_id: &str) -> Result<serde_json::Value, ControllerError> {
        let (pool, _job) = self.load(job_id).await?;

        let artifact = SearchArtifact::latest(&pool, ArtifactType::FollowupQuiz)
            .await
            .map_err(internal)?
            .ok_or(ControllerError::NotFound)?;

        serde_json::from_str(&artifact.content)
            .context("stored follow-up quiz is not valid JSON")
            .map_err(internal)
    }

    /// Resume a search from needs_followup with the client's answers.
    pub async fn resume(
        &self,
        job_id: &str,
        followup_responses: serde_json::Value,
    ) -> Result<StatusSnapshot, ControllerError> {
        let (pool, _job) = self.load(job_id).await?;

        let moved = SearchJob::transition(&pool, &[JobStatus::NeedsFollowup], JobStatus::Running)
            .await
            .map_err(internal)?;
        if !moved {
            return Err(ControllerError::InvalidTransition(
                "resume is only valid from needs_followup".to_string(),
            ));
        }

        SearchJob::set_followup_responses(&pool, &followup_responses)
            .await
            .map_err(internal)?;

        // A resumed stint gets a fresh batch budget; the counter itself
        // stays monotonic.
        let job = SearchJob::get(&pool).await.map_err(internal)?;
        SearchJob::extend_budget(&pool, job.batch_num + self.deps.config.max_batches)
            .await
            .map_err(internal)?;

        self.refresh_index(&pool, job_id).await.map_err(internal)?;
        self.arm_timer(&pool, job_id, 0).await.map_err(internal)?;
        self.deps
            .stream_hub
            .publish(job_id, SearchEvent::StatusChanged { status: JobStatus::Running })
            .await;

        info!(job_id, "search resumed with follow-up responses");
        self.status(job_id).await
    }

    /// Cancel a pending or running search.
    pub async fn cancel(&self, job_id: &str) -> Result<(), ControllerError> {
        let (pool, _job) = self.load(job_id).await?;

        let moved = SearchJob::transition(
            &pool,
            &[JobStatus::Pending, JobStatus::Running],
            JobStatus::Cancelled,
        )
        .await
        .map_err(internal)?;
        if !moved {
            return Err(ControllerError::InvalidTransition(
                "cancel is only valid from pending or running".to_string(),
            ));
        }

        // Disarm; an already in-flight batch finishes, the decision step
        // observes the terminal state, and the next firing is a no-op.
        SearchJob::set_wake(&pool, None).await.map_err(internal)?;
        self.refresh_index(&pool, job_id).await.map_err(internal)?;
        self.deps
            .stream_hub
            .publish(job_id, SearchEvent::StatusChanged { status: JobStatus::Cancelled })
            .await;

        info!(job_id, "search cancelled");
        Ok(())
    }

    /// Snapshot for SSE fan-out.
    pub async fn stream_snapshot(&self, job_id: &str) -> Result<StreamSnapshot, ControllerError> {
        let (pool, job) = self.load(job_id).await?;

        let good_results = DomainRecord::good_count(&pool).await.map_err(internal)?;
        let recent = DomainRecord::recent_available(&pool, 10)
            .await
            .map_err(internal)?;

        let domain_idea_status = match &job.quiz_responses.domain_idea {
            Some(idea) => DomainRecord::find(&pool, idea)
                .await
                .map_err(internal)?
                .map(|r| format!("{:?}", r.status).to_lowercase()),
            None => None,
        };

        Ok(StreamSnapshot {
            job_id: job.id,
            status: job.status,
            batch_num: job.batch_num,
            good_results,
            recent_available: recent.into_iter().map(|r| r.domain).collect(),
            domain_idea_status,
        })
    }

    /// Timer handler: runs one batch if the job is still running, then
    /// decides what happens next. Serialised per job by the scheduler.
    pub async fn on_timer_fire(&self, job_id: &str) -> anyhow::Result<()> {
        let pool = self.deps.stores.open(job_id).await?;
        let Some(job) = SearchJob::find(&pool).await? else {
            warn!(job_id, "timer fired for a job with no row; disarming");
            self.deps.index.set_wake(job_id, None).await?;
            return Ok(());
        };

        // A firing in any state but running is a silent no-op
        if job.status != JobStatus::Running {
            SearchJob::set_wake(&pool, None).await?;
            self.deps.index.set_wake(job_id, None).await?;
            return Ok(());
        }

        SearchJob::set_wake(&pool, None).await?;
        self.deps.index.set_wake(job_id, None).await?;

        match pipeline::run_batch(&self.deps, job_id).await {
            Ok(_report) => self.decide(&pool, job_id).await,
            Err(e) => {
                error!(job_id, error = %e, "pipeline failed; job marked failed");
                SearchJob::mark_failed(&pool, &format!("{e:#}")).await?;
                self.refresh_index(&pool, job_id).await?;
                self.deps
                    .stream_hub
                    .publish(job_id, SearchEvent::StatusChanged { status: JobStatus::Failed })
                    .await;
                Ok(())
            }
        }
    }

    /// The re-arm decision: complete, solicit follow-up, or continue.
    async fn decide(&self, pool: &SqlitePool, job_id: &str) -> anyhow::Result<()> {
        let job = SearchJob::get(pool).await?;

        // Cancelled (or failed) while the batch was in flight: writes from
        // that batch stand, but the terminal state does
        if job.status != JobStatus::Running {
            self.refresh_index(pool, job_id).await?;
            return Ok(());
        }

        let good_results = DomainRecord::good_count(pool).await?;

        if good_results >= self.deps.config.target_results {
            SearchJob::transition(pool, &[JobStatus::Running], JobStatus::Complete).await?;
            self.refresh_index(pool, job_id).await?;
            self.deps
                .stream_hub
                .publish(job_id, SearchEvent::StatusChanged { status: JobStatus::Complete })
                .await;
            info!(job_id, good_results, "search complete");

            if let Some(email) = &job.quiz_responses.client_email {
                if let Err(e) = self
                    .deps
                    .mailer
                    .send_results_ready(email, job_id, good_results)
                    .await
                {
                    warn!(job_id, error = %e, "results email failed; continuing");
                }
            }
            return Ok(());
        }

        if job.batch_num >= job.batch_budget {
            self.solicit_followup(pool, &job).await?;
            return Ok(());
        }

        self.arm_timer(pool, job_id, self.deps.config.alarm_delay_secs)
            .await?;
        self.refresh_index(pool, job_id).await?;
        Ok(())
    }

    /// Batch budget exhausted: generate and store the follow-up quiz, move
    /// to needs_followup, notify.
    async fn solicit_followup(&self, pool: &SqlitePool, job: &SearchJob) -> anyhow::Result<()> {
        let records = DomainRecord::all(pool).await?;
        let checked: Vec<String> = records.iter().map(|r| r.domain.clone()).collect();
        let available: Vec<String> = records
            .iter()
            .filter(|r| r.status == super::results::Availability::Available)
            .map(|r| r.domain.clone())
            .collect();
        let good_found = records
            .iter()
            .filter(|r| {
                r.status == super::results::Availability::Available && r.score >= GOOD_SCORE
            })
            .count() as i64;

        let provider = self.deps.providers.driver(job.driver_provider.as_deref())?;
        let generator = FollowupQuizGenerator::new(provider);
        let (followup, usage) = generator
            .generate(
                &job.quiz_responses,
                job.batch_num,
                checked.len() as i64,
                good_found,
                self.deps.config.target_results,
                &checked,
                &available,
            )
            .await;
        SearchJob::add_usage(pool, usage.input_tokens as i64, usage.output_tokens as i64).await?;

        SearchArtifact::insert(
            pool,
            job.batch_num,
            ArtifactType::FollowupQuiz,
            &serde_json::to_string(&followup)?,
        )
        .await?;

        SearchJob::transition(pool, &[JobStatus::Running], JobStatus::NeedsFollowup).await?;
        self.refresh_index(pool, &job.id).await?;
        self.deps
            .stream_hub
            .publish(
                &job.id,
                SearchEvent::StatusChanged {
                    status: JobStatus::NeedsFollowup,
                },
            )
            .await;
        info!(job_id = %job.id, "batch budget exhausted; follow-up quiz stored");

        if let Some(email) = &job.quiz_responses.client_email {
            if let Err(e) = self.deps.mailer.send_followup_request(email, &job.id).await {
                warn!(job_id = %job.id, error = %e, "follow-up email failed; continuing");
            }
        }

        Ok(())
    }

    /// Arm the persisted wake-up. Delay 0 nudges the scheduler immediately.
    async fn arm_timer(&self, pool: &SqlitePool, job_id: &str, delay_secs: u64) -> anyhow::Result<()> {
        let wake_at = Utc::now() + ChronoDuration::seconds(delay_secs as i64);
        SearchJob::set_wake(pool, Some(wake_at)).await?;
        self.deps.index.set_wake(job_id, Some(wake_at)).await?;

        if delay_secs == 0 {
            self.deps.wake_notify.notify_one();
        }

        Ok(())
    }

    /// Rebuild the job's index row from its authoritative store.
    pub async fn refresh_index(&self, pool: &SqlitePool, job_id: &str) -> anyhow::Result<()> {
        let job = SearchJob::get(pool).await?;
        let domains_checked = DomainRecord::checked_count(pool).await?;
        let good_results = DomainRecord::good_count(pool).await?;

        self.deps
            .index
            .upsert(&JobIndexRow {
                job_id: job.id.clone(),
                client_id: job.client_id.clone(),
                status: job.status,
                business_name: job.quiz_responses.business_name.clone(),
                batch_num: job.batch_num,
                domains_checked,
                good_results,
                wake_at: job.wake_at,
                created_at: job.created_at,
                updated_at: job.updated_at,
            })
            .await
    }

    async fn load(&self, job_id: &str) -> Result<(SqlitePool, SearchJob), ControllerError> {
        validate_job_id(job_id)?;
        if !self.deps.stores.store_exists(job_id) {
            return Err(ControllerError::NotFound);
        }

        let pool = self.deps.stores.open(job_id).await.map_err(internal)?;
        let job = SearchJob::find(&pool)
            .await
            .map_err(internal)?
            .ok_or(ControllerError::NotFound)?;

        Ok((pool, job))
    }

    /// Rough spend estimate from the per-provider cost table, assuming the
    /// historical 20/80 driver/swarm token split.
    fn estimate_cost(&self, job: &SearchJob) -> f64 {
        let driver = self.deps.providers.driver(job.driver_provider.as_deref());
        let swarm = self.deps.providers.swarm(job.swarm_provider.as_deref());

        let (driver_in, driver_out) = driver.map(|p| p.cost_per_mtok()).unwrap_or((0.0, 0.0));
        let (swarm_in, swarm_out) = swarm.map(|p| p.cost_per_mtok()).unwrap_or((0.0, 0.0));

        let input = job.total_input_tokens as f64 / 1_000_000.0;
        let output = job.total_output_tokens as f64 / 1_000_000.0;

        let cost = input * (0.2 * driver_in + 0.8 * swarm_in)
            + output * (0.2 * driver_out + 0.8 * swarm_out);
        (cost * 10_000.0).round() / 10_000.0
    }
}

/// Job ids become store filenames; keep them boring.
fn validate_job_id(job_id: &str) -> Result<(), ControllerError> {
    let ok = !job_id.is_empty()
        && job_id.len() <= 128
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if ok {
        Ok(())
    } else {
        Err(ControllerError::InvalidInput(format!(
            "invalid job id: {job_id:?}"
        )))
    }
}

fn internal(e: anyhow::Error) -> ControllerError {
    ControllerError::Internal(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_validation() {
        assert!(validate_job_id("job-123_abc").is_ok());
        assert!(validate_job_id("").is_err());
        assert!(validate_job_id("../escape").is_err());
        assert!(validate_job_id("has space").is_err());
        assert!(validate_job_id(&"x".repeat(200)).is_err());
    }
}
