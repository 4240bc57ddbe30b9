//! Search job model.
//!
//! Exactly one `search_job` row exists per job store. All mutation goes
//! through guarded UPDATEs so observable transitions follow the lifecycle
//! machine: pending → running → {complete, needs_followup, failed,
//! cancelled}, with needs_followup → running via resume.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};
use typed_builder::TypedBuilder;

/// Lifecycle status of a search job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Complete,
    NeedsFollowup,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states: a timer firing on these is a silent no-op and no
    /// further transitions are observable.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::NeedsFollowup => "needs_followup",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "complete" => Ok(JobStatus::Complete),
            "needs_followup" => Ok(JobStatus::NeedsFollowup),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(anyhow!("unknown job status: {other}")),
        }
    }
}

/// Client intake questionnaire. Immutable after job creation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuizResponses {
    pub business_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_idea: Option<String>,

    /// Ordered preference; must be non-empty. "any" means open to anything.
    pub tld_preferences: Vec<String>,

    pub vibe: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_email: Option<String>,
}

/// The singleton job row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct SearchJob {
    pub id: String,
    pub client_id: String,

    #[builder(default)]
    pub status: JobStatus,

    #[builder(default = 0)]
    pub batch_num: i64,

    /// Batches allowed before soliciting follow-up. Resume extends it, so
    /// `batch_num` stays monotonic while each running stint is bounded.
    #[builder(default = 6)]
    pub batch_budget: i64,

    pub quiz_responses: Json<QuizResponses>,

    #[builder(default, setter(strip_option))]
    pub followup_responses: Option<Json<serde_json::Value>>,

    #[builder(default, setter(strip_option))]
    pub driver_provider: Option<String>,

    #[builder(default, setter(strip_option))]
    pub swarm_provider: Option<String>,

    #[builder(default = 0)]
    pub total_input_tokens: i64,

    #[builder(default = 0)]
    pub total_output_tokens: i64,

    #[builder(default, setter(strip_option))]
    pub wake_at: Option<DateTime<Utc>>,

    #[builder(default, setter(strip_option))]
    pub error: Option<String>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,

    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl SearchJob {
    /// Insert the job row. Fails if one already exists in this store.
    pub async fn insert(&self, pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO search_job
                (id, client_id, status, batch_num, batch_budget, quiz_responses,
                 followup_responses, driver_provider, swarm_provider, total_input_tokens,
                 total_output_tokens, wake_at, error, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&self.id)
        .bind(&self.client_id)
        .bind(self.status)
        .bind(self.batch_num)
        .bind(self.batch_budget)
        .bind(&self.quiz_responses)
        .bind(&self.followup_responses)
        .bind(&self.driver_provider)
        .bind(&self.swarm_provider)
        .bind(self.total_input_tokens)
        .bind(self.total_output_tokens)
        .bind(self.wake_at)
        .bind(&self.error)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Load the job row, if this store has one.
    pub async fn find(pool: &SqlitePool) -> Result<Option<SearchJob>> {
        let job = sqlx::query_as::<_, SearchJob>("SELECT * FROM search_job LIMIT 1")
            .fetch_optional(pool)
            .await?;

        Ok(job)
    }

    /// Load the job row or fail.
    pub async fn get(pool: &SqlitePool) -> Result<SearchJob> {
        Self::find(pool)
            .await?
            .ok_or_else(|| anyhow!("job store has no search_job row"))
    }

    /// Transition status, guarded by the set of states the transition is
    /// legal from. Returns false when the current status was not in `from`.
    pub async fn transition(
        pool: &SqlitePool,
        from: &[JobStatus],
        to: JobStatus,
    ) -> Result<bool> {
        let placeholders: Vec<String> =
            (0..from.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "UPDATE search_job SET status = ?1, updated_at = ?{} WHERE status IN ({})",
            from.len() + 2,
            placeholders.join(", ")
        );

        let mut query = sqlx::query(&sql).bind(to);
        for status in from {
            query = query.bind(*status);
        }
        query = query.bind(Utc::now());

        let result = query.execute(pool).await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record a fatal pipeline error.
    pub async fn mark_failed(pool: &SqlitePool, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE search_job SET status = ?1, error = ?2, wake_at = NULL, updated_at = ?3",
        )
        .bind(JobStatus::Failed)
        .bind(error)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Atomically advance the batch counter, returning the new value.
    pub async fn advance_batch(pool: &SqlitePool) -> Result<i64> {
        sqlx::query("UPDATE search_job SET batch_num = batch_num + 1, updated_at = ?1")
            .bind(Utc::now())
            .execute(pool)
            .await?;

        let batch_num =
            sqlx::query_scalar::<_, i64>("SELECT batch_num FROM search_job")
                .fetch_one(pool)
                .await?;

        Ok(batch_num)
    }

    /// Add token usage to the monotonic counters.
    pub async fn add_usage(pool: &SqlitePool, input_tokens: i64, output_tokens: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE search_job SET
                total_input_tokens = total_input_tokens + ?1,
                total_output_tokens = total_output_tokens + ?2,
                updated_at = ?3
            "#,
        )
        .bind(input_tokens.max(0))
        .bind(output_tokens.max(0))
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Arm or disarm the persisted wake-up. Re-arming replaces any prior
    /// pending wake-up; there is never more than one.
    pub async fn set_wake(pool: &SqlitePool, wake_at: Option<DateTime<Utc>>) -> Result<()> {
        sqlx::query("UPDATE search_job SET wake_at = ?1, updated_at = ?2")
            .bind(wake_at)
            .bind(Utc::now())
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Record follow-up responses (set once, on resume).
    pub async fn set_followup_responses(
        pool: &SqlitePool,
        responses: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query("UPDATE search_job SET followup_responses = ?1, updated_at = ?2")
            .bind(Json(responses.clone()))
            .bind(Utc::now())
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Extend the batch budget for a resumed stint.
    pub async fn extend_budget(pool: &SqlitePool, new_budget: i64) -> Result<()> {
        sqlx::query("UPDATE search_job SET batch_budget = ?1, updated_at = ?2")
            .bind(new_budget)
            .bind(Utc::now())
            .execute(pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::store::StoreManager;

    fn quiz() -> QuizResponses {
        QuizResponses {
            business_name: "Sunrise Bakery".into(),
            tld_preferences: vec!["com".into(), "co".into(), "io".into()],
            vibe: "creative".into(),
            ..Default::default()
        }
    }

    async fn job_pool() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = StoreManager::new(dir.path()).open("job-1").await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_insert_roundtrip() {
        let (_dir, pool) = job_pool().await;

        let job = SearchJob::builder()
            .id("job-1")
            .client_id("client-1")
            .status(JobStatus::Running)
            .quiz_responses(Json(quiz()))
            .build();
        job.insert(&pool).await.unwrap();

        let loaded = SearchJob::get(&pool).await.unwrap();
        assert_eq!(loaded.id, "job-1");
        assert_eq!(loaded.status, JobStatus::Running);
        assert_eq!(loaded.quiz_responses.business_name, "Sunrise Bakery");
        assert_eq!(loaded.batch_num, 0);
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails() {
        let (_dir, pool) = job_pool().await;

        let job = SearchJob::builder()
            .id("job-1")
            .client_id("client-1")
            .quiz_responses(Json(quiz()))
            .build();
        job.insert(&pool).await.unwrap();
        assert!(job.insert(&pool).await.is_err());
    }

    #[tokio::test]
    async fn test_guarded_transition() {
        let (_dir, pool) = job_pool().await;
        SearchJob::builder()
            .id("job-1")
            .client_id("c")
            .status(JobStatus::Running)
            .quiz_responses(Json(quiz()))
            .build()
            .insert(&pool)
            .await
            .unwrap();

        // running -> cancelled is legal
        let moved = SearchJob::transition(
            &pool,
            &[JobStatus::Pending, JobStatus::Running],
            JobStatus::Cancelled,
        )
        .await
        .unwrap();
        assert!(moved);

        // cancelled -> running is not
        let moved = SearchJob::transition(&pool, &[JobStatus::NeedsFollowup], JobStatus::Running)
            .await
            .unwrap();
        assert!(!moved);
        assert_eq!(SearchJob::get(&pool).await.unwrap().status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_counters_are_monotonic() {
        let (_dir, pool) = job_pool().await;
        SearchJob::builder()
            .id("job-1")
            .client_id("c")
            .quiz_responses(Json(quiz()))
            .build()
            .insert(&pool)
            .await
            .unwrap();

        assert_eq!(SearchJob::advance_batch(&pool).await.unwrap(), 1);
        assert_eq!(SearchJob::advance_batch(&pool).await.unwrap(), 2);

        SearchJob::add_usage(&pool, 100, 50).await.unwrap();
        SearchJob::add_usage(&pool, -10, 25).await.unwrap(); // negative input ignored

        let job = SearchJob::get(&pool).await.unwrap();
        assert_eq!(job.total_input_tokens, 100);
        assert_eq!(job.total_output_tokens, 75);
    }
}
