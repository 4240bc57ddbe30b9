//! Search artifacts: append-only records a batch leaves behind.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    /// Per-batch counts and duration, JSON
    BatchReport,
    /// The learning context fed to the generator
    StrategyNotes,
    /// Follow-up questionnaire for the client
    FollowupQuiz,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SearchArtifact {
    pub id: i64,
    pub batch_num: i64,
    pub artifact_type: ArtifactType,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl SearchArtifact {
    pub async fn insert(
        pool: &SqlitePool,
        batch_num: i64,
        artifact_type: ArtifactType,
        content: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO search_artifacts (batch_num, artifact_type, content, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(batch_num)
        .bind(artifact_type)
        .bind(content)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Most recent artifact of a type, if any.
    pub async fn latest(
        pool: &SqlitePool,
        artifact_type: ArtifactType,
    ) -> Result<Option<SearchArtifact>> {
        let artifact = sqlx::query_as::<_, SearchArtifact>(
            r#"
            SELECT * FROM search_artifacts
            WHERE artifact_type = ?1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(artifact_type)
        .fetch_optional(pool)
        .await?;

        Ok(artifact)
    }

    pub async fn count(pool: &SqlitePool, artifact_type: ArtifactType) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM search_artifacts WHERE artifact_type = ?1",
        )
        .bind(artifact_type)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::store::StoreManager;

    #[tokio::test]
    async fn test_latest_returns_newest_of_type() {
        let dir = tempfile::tempdir().unwrap();
        let pool = StoreManager::new(dir.path()).open("job-1").await.unwrap();

        SearchArtifact::insert(&pool, 1, ArtifactType::BatchReport, r#"{"batch":1}"#)
            .await
            .unwrap();
        SearchArtifact::insert(&pool, 6, ArtifactType::FollowupQuiz, r#"{"questions":[]}"#)
            .await
            .unwrap();
        SearchArtifact::insert(&pool, 2, ArtifactType::BatchReport, r#"{"batch":2}"#)
            .await
            .unwrap();

        let report = SearchArtifact::latest(&pool, ArtifactType::BatchReport)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.batch_num, 2);

        let quiz = SearchArtifact::latest(&pool, ArtifactType::FollowupQuiz)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(quiz.batch_num, 6);

        assert!(SearchArtifact::latest(&pool, ArtifactType::StrategyNotes)
            .await
            .unwrap()
            .is_none());

        assert_eq!(
            SearchArtifact::count(&pool, ArtifactType::BatchReport).await.unwrap(),
            2
        );
    }
}
