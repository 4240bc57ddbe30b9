//! Embedded SQL stores.
//!
//! Each job owns a private SQLite file under the data directory; that file is
//! the job's authoritative, crash-resumable state. A separate process-wide
//! `index.db` carries the listing/scheduling index, rebuildable from the
//! per-job stores via backfill.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domains::search::JobStatus;

/// Schema for a job's private store.
const JOB_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS search_job (
    id                  TEXT PRIMARY KEY,
    client_id           TEXT NOT NULL,
    status              TEXT NOT NULL DEFAULT 'pending',
    batch_num           INTEGER NOT NULL DEFAULT 0,
    batch_budget        INTEGER NOT NULL DEFAULT 6,
    quiz_responses      TEXT NOT NULL,
    followup_responses  TEXT,
    driver_provider     TEXT,
    swarm_provider      TEXT,
    total_input_tokens  INTEGER NOT NULL DEFAULT 0,
    total_output_tokens INTEGER NOT NULL DEFAULT 0,
    wake_at             TEXT,
    error               TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS domain_results (
    domain          TEXT PRIMARY KEY,
    batch_num       INTEGER NOT NULL,
    tld             TEXT NOT NULL,
    status          TEXT NOT NULL,
    price_cents     INTEGER,
    score           REAL NOT NULL DEFAULT 0,
    flags           TEXT NOT NULL DEFAULT '[]',
    evaluation_data TEXT,
    checked_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_domain_results_status ON domain_results(status);
CREATE INDEX IF NOT EXISTS idx_domain_results_batch ON domain_results(batch_num);

CREATE TABLE IF NOT EXISTS search_artifacts (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_num     INTEGER NOT NULL,
    artifact_type TEXT NOT NULL,
    content       TEXT NOT NULL,
    created_at    TEXT NOT NULL
);
"#;

/// Schema for the process-wide index.
const INDEX_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS job_index (
    job_id          TEXT PRIMARY KEY,
    client_id       TEXT NOT NULL,
    status          TEXT NOT NULL,
    business_name   TEXT NOT NULL,
    batch_num       INTEGER NOT NULL DEFAULT 0,
    domains_checked INTEGER NOT NULL DEFAULT 0,
    good_results    INTEGER NOT NULL DEFAULT 0,
    wake_at         TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_job_index_status ON job_index(status);
CREATE INDEX IF NOT EXISTS idx_job_index_created ON job_index(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_job_index_client ON job_index(client_id);
"#;

/// Opens and caches per-job store pools.
pub struct StoreManager {
    data_dir: PathBuf,
    pools: RwLock<HashMap<String, SqlitePool>>,
}

impl StoreManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            pools: RwLock::new(HashMap::new()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Open (creating if missing) the store for a job.
    pub async fn open(&self, job_id: &str) -> Result<SqlitePool> {
        if let Some(pool) = self.pools.read().await.get(job_id) {
            return Ok(pool.clone());
        }

        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create data dir {}", self.data_dir.display()))?;

        let path = self.data_dir.join(format!("{job_id}.db"));
        debug!(job_id, path = %path.display(), "opening job store");

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        // One connection: the job is single-writer by contract, and SQLite
        // serialises everything behind it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open job store {}", path.display()))?;

        sqlx::raw_sql(JOB_SCHEMA)
            .execute(&pool)
            .await
            .context("failed to apply job schema")?;

        let mut pools = self.pools.write().await;
        let pool = pools.entry(job_id.to_string()).or_insert(pool).clone();
        Ok(pool)
    }

    /// Whether a store file exists for the job (without creating one).
    pub fn store_exists(&self, job_id: &str) -> bool {
        self.data_dir.join(format!("{job_id}.db")).exists()
    }
}

/// One row of the process-wide job index.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct JobIndexRow {
    pub job_id: String,
    pub client_id: String,
    pub status: JobStatus,
    pub business_name: String,
    pub batch_num: i64,
    pub domains_checked: i64,
    pub good_results: i64,
    #[serde(skip_serializing)]
    pub wake_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The process-wide listing and scheduling index.
#[derive(Clone)]
pub struct IndexStore {
    pool: SqlitePool,
}

impl IndexStore {
    /// Open `index.db` under the data directory.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let options = SqliteConnectOptions::new()
            .filename(data_dir.join("index.db"))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("failed to open index store")?;

        sqlx::raw_sql(INDEX_SCHEMA)
            .execute(&pool)
            .await
            .context("failed to apply index schema")?;

        Ok(Self { pool })
    }

    /// Insert or refresh a job's index row.
    pub async fn upsert(&self, row: &JobIndexRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_index
                (job_id, client_id, status, business_name, batch_num,
                 domains_checked, good_results, wake_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(job_id) DO UPDATE SET
                status = excluded.status,
                batch_num = excluded.batch_num,
                domains_checked = excluded.domains_checked,
                good_results = excluded.good_results,
                wake_at = excluded.wake_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&row.job_id)
        .bind(&row.client_id)
        .bind(row.status)
        .bind(&row.business_name)
        .bind(row.batch_num)
        .bind(row.domains_checked)
        .bind(row.good_results)
        .bind(row.wake_at)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<JobIndexRow>> {
        let row = sqlx::query_as::<_, JobIndexRow>(
            "SELECT * FROM job_index WHERE job_id = ?1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Paginated listing, optionally filtered by status.
    pub async fn list(
        &self,
        limit: i64,
        offset: i64,
        status: Option<JobStatus>,
    ) -> Result<Vec<JobIndexRow>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, JobIndexRow>(
                    r#"
                    SELECT * FROM job_index WHERE status = ?1
                    ORDER BY created_at DESC LIMIT ?2 OFFSET ?3
                    "#,
                )
                .bind(status)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, JobIndexRow>(
                    "SELECT * FROM job_index ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows)
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<JobIndexRow>> {
        self.list(limit, 0, None).await
    }

    /// Update the persisted wake-up for a job (None disarms).
    pub async fn set_wake(&self, job_id: &str, wake_at: Option<DateTime<Utc>>) -> Result<()> {
        sqlx::query("UPDATE job_index SET wake_at = ?1, updated_at = ?2 WHERE job_id = ?3")
            .bind(wake_at)
            .bind(Utc::now())
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Job ids whose wake-up time has passed.
    ///
    /// Only pending/running jobs are eligible; the ticker re-checks the
    /// authoritative per-job row before doing any work.
    pub async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT job_id FROM job_index
            WHERE wake_at IS NOT NULL AND wake_at <= ?1
              AND status IN ('pending', 'running')
            ORDER BY wake_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_row(job_id: &str, status: JobStatus) -> JobIndexRow {
        JobIndexRow {
            job_id: job_id.to_string(),
            client_id: "client-1".to_string(),
            status,
            business_name: "Sunrise Bakery".to_string(),
            batch_num: 0,
            domains_checked: 0,
            good_results: 0,
            wake_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_job_store_schema_applies() {
        let dir = tempfile::tempdir().unwrap();
        let stores = StoreManager::new(dir.path());

        let pool = stores.open("job-a").await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM domain_results")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert!(stores.store_exists("job-a"));
        assert!(!stores.store_exists("job-b"));
    }

    #[tokio::test]
    async fn test_open_returns_cached_pool() {
        let dir = tempfile::tempdir().unwrap();
        let stores = StoreManager::new(dir.path());

        let first = stores.open("job-a").await.unwrap();
        sqlx::query("INSERT INTO search_artifacts (batch_num, artifact_type, content, created_at) VALUES (1, 'batch_report', '{}', ?1)")
            .bind(Utc::now())
            .execute(&first)
            .await
            .unwrap();

        let second = stores.open("job-a").await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_artifacts")
            .fetch_one(&second)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_index_upsert_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let index = IndexStore::open(dir.path()).await.unwrap();

        index.upsert(&index_row("a", JobStatus::Running)).await.unwrap();
        index.upsert(&index_row("b", JobStatus::Complete)).await.unwrap();

        let mut updated = index_row("a", JobStatus::Running);
        updated.batch_num = 3;
        index.upsert(&updated).await.unwrap();

        let all = index.list(10, 0, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let running = index.list(10, 0, Some(JobStatus::Running)).await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].batch_num, 3);
    }

    #[tokio::test]
    async fn test_due_jobs_skips_terminal_and_future() {
        let dir = tempfile::tempdir().unwrap();
        let index = IndexStore::open(dir.path()).await.unwrap();

        let mut due = index_row("due", JobStatus::Running);
        due.wake_at = Some(Utc::now() - chrono::Duration::seconds(5));
        index.upsert(&due).await.unwrap();

        let mut future = index_row("future", JobStatus::Running);
        future.wake_at = Some(Utc::now() + chrono::Duration::seconds(60));
        index.upsert(&future).await.unwrap();

        let mut cancelled = index_row("cancelled", JobStatus::Cancelled);
        cancelled.wake_at = Some(Utc::now() - chrono::Duration::seconds(5));
        index.upsert(&cancelled).await.unwrap();

        let ids = index.due_jobs(Utc::now()).await.unwrap();
        assert_eq!(ids, vec!["due".to_string()]);
    }
}
