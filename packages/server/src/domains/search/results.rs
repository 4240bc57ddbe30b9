//! Domain result rows and derived aggregates.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

/// Registration status as recorded for a checked domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Registered,
    Unknown,
}

impl From<rdap_client::DomainStatus> for Availability {
    fn from(status: rdap_client::DomainStatus) -> Self {
        match status {
            rdap_client::DomainStatus::Available => Availability::Available,
            rdap_client::DomainStatus::Registered => Availability::Registered,
            rdap_client::DomainStatus::Unknown => Availability::Unknown,
        }
    }
}

/// Yearly-price buckets for display and ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceCategory {
    Bundled,
    Recommended,
    Premium,
    Unknown,
}

impl PriceCategory {
    /// Thresholds are cents per year. Changing the denomination is a
    /// behavior change, not a cleanup.
    pub const BUNDLED_MAX_CENTS: i64 = 3000;
    pub const RECOMMENDED_MAX_CENTS: i64 = 5000;

    pub fn for_price(price_cents: Option<i64>) -> Self {
        match price_cents {
            None => PriceCategory::Unknown,
            Some(cents) if cents <= Self::BUNDLED_MAX_CENTS => PriceCategory::Bundled,
            Some(cents) if cents <= Self::RECOMMENDED_MAX_CENTS => PriceCategory::Recommended,
            Some(_) => PriceCategory::Premium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceCategory::Bundled => "bundled",
            PriceCategory::Recommended => "recommended",
            PriceCategory::Premium => "premium",
            PriceCategory::Unknown => "unknown",
        }
    }
}

/// Opaque evaluation blob stored alongside each result.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvaluationData {
    pub pronounceable: bool,
    pub memorable: bool,
    pub brand_fit: bool,
    pub email_friendly: bool,
    pub worth_checking: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_category: Option<PriceCategory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_cents: Option<i64>,
}

/// One checked (or screened-out) domain. Unique per job by lowercase
/// `domain`; a later batch re-checking the same string replaces the row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DomainRecord {
    pub domain: String,
    pub batch_num: i64,
    pub tld: String,
    pub status: Availability,
    pub price_cents: Option<i64>,
    pub score: f64,
    pub flags: Json<Vec<String>>,
    pub evaluation_data: Option<Json<EvaluationData>>,
    pub checked_at: DateTime<Utc>,
}

impl DomainRecord {
    pub fn new(domain: impl Into<String>, batch_num: i64, status: Availability, score: f64) -> Self {
        let domain = domain.into().to_lowercase();
        let tld = domain.rsplit('.').next().unwrap_or_default().to_string();
        Self {
            domain,
            batch_num,
            tld,
            status,
            price_cents: None,
            score,
            flags: Json(Vec::new()),
            evaluation_data: None,
            checked_at: Utc::now(),
        }
    }

    /// Insert-or-replace keyed by domain.
    pub async fn upsert(&self, pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO domain_results
                (domain, batch_num, tld, status, price_cents, score, flags,
                 evaluation_data, checked_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(domain) DO UPDATE SET
                batch_num = excluded.batch_num,
                tld = excluded.tld,
                status = excluded.status,
                price_cents = excluded.price_cents,
                score = excluded.score,
                flags = excluded.flags,
                evaluation_data = excluded.evaluation_data,
                checked_at = excluded.checked_at
            "#,
        )
        .bind(&self.domain)
        .bind(self.batch_num)
        .bind(&self.tld)
        .bind(self.status)
        .bind(self.price_cents)
        .bind(self.score)
        .bind(&self.flags)
        .bind(&self.evaluation_data)
        .bind(self.checked_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// All rows, oldest first.
    pub async fn all(pool: &SqlitePool) -> Result<Vec<DomainRecord>> {
        let rows = sqlx::query_as::<_, DomainRecord>(
            "SELECT * FROM domain_results ORDER BY checked_at ASC, domain ASC",
        )
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Available domains, best first: score descending, then cheapest,
    /// unpriced last.
    pub async fn ranked_available(pool: &SqlitePool, limit: i64) -> Result<Vec<DomainRecord>> {
        let rows = sqlx::query_as::<_, DomainRecord>(
            r#"
            SELECT * FROM domain_results
            WHERE status = 'available'
            ORDER BY score DESC, price_cents ASC NULLS LAST
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Recently available domains for the stream snapshot.
    pub async fn recent_available(pool: &SqlitePool, limit: i64) -> Result<Vec<DomainRecord>> {
        let rows = sqlx::query_as::<_, DomainRecord>(
            r#"
            SELECT * FROM domain_results
            WHERE status = 'available'
            ORDER BY checked_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn find(pool: &SqlitePool, domain: &str) -> Result<Option<DomainRecord>> {
        let row = sqlx::query_as::<_, DomainRecord>(
            "SELECT * FROM domain_results WHERE domain = ?1",
        )
        .bind(domain.to_lowercase())
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    pub async fn checked_count(pool: &SqlitePool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM domain_results")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    pub async fn available_count(pool: &SqlitePool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM domain_results WHERE status = 'available'",
        )
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Good results: available with a score at or above the termination
    /// threshold (0.8). Distinct from the 0.4 availability-check admission
    /// threshold.
    pub async fn good_count(pool: &SqlitePool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM domain_results WHERE status = 'available' AND score >= 0.8",
        )
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Display price in dollars, when priced.
    pub fn price_dollars(&self) -> Option<f64> {
        self.price_cents.map(|cents| cents as f64 / 100.0)
    }

    pub fn price_category(&self) -> PriceCategory {
        PriceCategory::for_price(self.price_cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::store::StoreManager;

    async fn pool() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = StoreManager::new(dir.path()).open("job-1").await.unwrap();
        (dir, pool)
    }

    #[test]
    fn test_price_categories_cents() {
        assert_eq!(PriceCategory::for_price(None), PriceCategory::Unknown);
        assert_eq!(PriceCategory::for_price(Some(1200)), PriceCategory::Bundled);
        assert_eq!(PriceCategory::for_price(Some(3000)), PriceCategory::Bundled);
        assert_eq!(PriceCategory::for_price(Some(3001)), PriceCategory::Recommended);
        assert_eq!(PriceCategory::for_price(Some(5000)), PriceCategory::Recommended);
        assert_eq!(PriceCategory::for_price(Some(5001)), PriceCategory::Premium);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_domain() {
        let (_dir, pool) = pool().await;

        let unknown = DomainRecord::new("Sunrise.COM", 1, Availability::Unknown, 0.3);
        unknown.upsert(&pool).await.unwrap();

        // Re-checked in a later batch with a real verdict
        let mut available = DomainRecord::new("sunrise.com", 2, Availability::Available, 0.9);
        available.price_cents = Some(1200);
        available.upsert(&pool).await.unwrap();

        assert_eq!(DomainRecord::checked_count(&pool).await.unwrap(), 1);
        let row = DomainRecord::find(&pool, "sunrise.com").await.unwrap().unwrap();
        assert_eq!(row.batch_num, 2);
        assert_eq!(row.status, Availability::Available);
        assert_eq!(row.score, 0.9);
    }

    #[tokio::test]
    async fn test_ranked_available_ordering() {
        let (_dir, pool) = pool().await;

        let mut cheap = DomainRecord::new("cheap.io", 1, Availability::Available, 0.8);
        cheap.price_cents = Some(1000);
        cheap.upsert(&pool).await.unwrap();

        let mut pricey = DomainRecord::new("pricey.io", 1, Availability::Available, 0.8);
        pricey.price_cents = Some(9000);
        pricey.upsert(&pool).await.unwrap();

        let unpriced = DomainRecord::new("unpriced.io", 1, Availability::Available, 0.8);
        unpriced.upsert(&pool).await.unwrap();

        let best = DomainRecord::new("best.com", 1, Availability::Available, 0.95);
        best.upsert(&pool).await.unwrap();

        DomainRecord::new("taken.com", 1, Availability::Registered, 0.99)
            .upsert(&pool)
            .await
            .unwrap();

        let ranked = DomainRecord::ranked_available(&pool, 50).await.unwrap();
        let order: Vec<_> = ranked.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(order, ["best.com", "cheap.io", "pricey.io", "unpriced.io"]);
    }

    #[tokio::test]
    async fn test_good_count_uses_termination_threshold() {
        let (_dir, pool) = pool().await;

        DomainRecord::new("good.com", 1, Availability::Available, 0.8)
            .upsert(&pool)
            .await
            .unwrap();
        DomainRecord::new("decent.com", 1, Availability::Available, 0.79)
            .upsert(&pool)
            .await
            .unwrap();
        DomainRecord::new("takenbutgreat.com", 1, Availability::Registered, 0.95)
            .upsert(&pool)
            .await
            .unwrap();

        assert_eq!(DomainRecord::good_count(&pool).await.unwrap(), 1);
        assert_eq!(DomainRecord::available_count(&pool).await.unwrap(), 2);
        assert_eq!(DomainRecord::checked_count(&pool).await.unwrap(), 3);
    }
}
