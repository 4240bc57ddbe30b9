//! The batch pipeline: one timer firing, one batch.
//!
//! Strictly ordered stages: advance the batch counter, rebuild context from
//! the store, generate, deduplicate, evaluate, screen, check availability,
//! price, persist, report. Provider trouble degrades (zero-work batch,
//! heuristic scores); an error escaping this module is fatal to the job.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::kernel::deps::SearchDeps;
use crate::kernel::stream_hub::SearchEvent;
use crate::kernel::traits::DomainPrice;

use super::artifacts::{ArtifactType, SearchArtifact};
use super::driver::{DriverAgent, PreviousResults};
use super::job::SearchJob;
use super::results::{Availability, DomainRecord, EvaluationData, PriceCategory};
use super::swarm::{DomainEvaluation, SwarmAgent};

/// Screening thresholds. Admission gates the availability check; the
/// termination threshold defines a "good" result. They are different
/// numbers on purpose.
pub const ADMISSION_SCORE: f64 = 0.4;
pub const GOOD_SCORE: f64 = 0.8;

/// Flag attached to candidates persisted without an availability check.
const SCREENED_OUT_FLAG: &str = "screened_out";

/// Counts for one batch, persisted as the `batch_report` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_num: i64,
    pub candidates_generated: usize,
    pub candidates_evaluated: usize,
    pub screened_out: usize,
    pub domains_checked: usize,
    pub domains_available: usize,
    pub new_good_results: usize,
    pub duration_ms: u64,
}

/// Run one batch against a job's store.
pub async fn run_batch(deps: &SearchDeps, job_id: &str) -> Result<BatchReport> {
    let start = Instant::now();
    let pool = deps.stores.open(job_id).await?;
    let job = SearchJob::get(&pool).await?;

    // 1. Advance the counter; this batch consumes a slot no matter what
    let batch_num = SearchJob::advance_batch(&pool).await?;

    deps.stream_hub
        .publish(job_id, SearchEvent::BatchStarted { batch_num })
        .await;

    // 2. Context from prior batches
    let prior = DomainRecord::all(&pool).await?;
    let context = build_context(&prior, deps.config.target_results);
    let checked_set: HashSet<String> = prior.iter().map(|r| r.domain.clone()).collect();

    if batch_num >= 2 {
        let notes = serde_json::json!({
            "checked_total": context.checked_total,
            "available_total": context.available_total,
            "tried": context.tried_summary(),
            "available": context.available_summary(),
            "taken_patterns": context.taken_patterns(),
        });
        SearchArtifact::insert(&pool, batch_num, ArtifactType::StrategyNotes, &notes.to_string())
            .await?;
    }

    // 3. Generate. Provider failure degrades to a zero-work batch.
    let driver_provider = deps
        .providers
        .driver(job.driver_provider.as_deref())
        .context("driver provider unavailable")?;
    let driver = DriverAgent::new(driver_provider);

    let quiz = &job.quiz_responses.0;
    let followup = job.followup_responses.as_ref().map(|j| &j.0);
    let generated = match driver
        .generate_candidates(
            quiz,
            batch_num,
            job.batch_budget,
            deps.config.candidates_per_batch,
            (batch_num > 1).then_some(&context),
            followup,
        )
        .await
    {
        Ok(generated) => generated,
        Err(e) => {
            warn!(job_id, batch_num, error = %e, "generation failed; recording zero-work batch");
            return finish_zero_work(deps, &pool, job_id, batch_num, 0, start).await;
        }
    };
    SearchJob::add_usage(
        &pool,
        generated.usage.input_tokens as i64,
        generated.usage.output_tokens as i64,
    )
    .await?;

    // 4. Drop anything already checked in any prior batch
    let candidates: Vec<String> = generated
        .domains
        .iter()
        .filter(|d| !checked_set.contains(*d))
        .cloned()
        .collect();
    let candidates_generated = generated.domains.len();

    if candidates.is_empty() {
        info!(job_id, batch_num, "no new candidates after dedup");
        return finish_zero_work(deps, &pool, job_id, batch_num, candidates_generated, start).await;
    }

    // 5. Evaluate in bounded-concurrency chunks
    let swarm_provider = deps
        .providers
        .swarm(job.swarm_provider.as_deref())
        .context("swarm provider unavailable")?;
    let swarm = SwarmAgent::new(
        swarm_provider,
        deps.config.eval_chunk_size,
        deps.config.eval_max_concurrent,
    );
    let evaluated = swarm.evaluate(&candidates, &quiz.vibe, &quiz.business_name).await;
    SearchJob::add_usage(
        &pool,
        evaluated.usage.input_tokens as i64,
        evaluated.usage.output_tokens as i64,
    )
    .await?;

    let eval_map: HashMap<String, DomainEvaluation> = evaluated
        .evaluations
        .into_iter()
        .map(|e| (e.domain.to_lowercase(), e))
        .collect();

    // 6. Screen. Discards are persisted right away (status unknown, reason
    // flagged) so later batches never regenerate them.
    let mut admitted: Vec<String> = Vec::new();
    let mut screened_out = 0usize;
    for domain in &candidates {
        let Some(evaluation) = eval_map.get(domain.as_str()) else {
            continue;
        };
        if evaluation.worth_checking && evaluation.score >= ADMISSION_SCORE {
            admitted.push(domain.clone());
        } else {
            screened_out += 1;
            persist_screened_out(&pool, batch_num, evaluation).await?;
        }
    }

    // 7. Availability. Per-domain trouble is already folded to unknown by
    // the checker; an Err here is an adapter fault and fails the job.
    let checks = deps
        .checker
        .check_bulk(&admitted)
        .await
        .context("availability check failed")?;

    // 8. One bulk pricing call for whatever came back available
    let available_domains: Vec<String> = checks
        .iter()
        .filter(|c| c.status == rdap_client::DomainStatus::Available)
        .map(|c| c.domain.clone())
        .collect();
    let prices = if available_domains.is_empty() {
        HashMap::new()
    } else {
        match deps.pricing.bulk(&available_domains).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!(job_id, batch_num, error = %e, "pricing failed; prices stay unknown");
                HashMap::new()
            }
        }
    };

    // 9. Persist one row per checked domain
    let mut new_good_results = 0usize;
    for check in &checks {
        let evaluation = eval_map.get(&check.domain);
        let price = prices.get(&check.domain);

        let record = build_record(batch_num, check, evaluation, price);
        if record.status == Availability::Available && record.score >= GOOD_SCORE {
            new_good_results += 1;
        }
        record.upsert(&pool).await?;
    }

    // 10. Report
    let report = BatchReport {
        batch_num,
        candidates_generated,
        candidates_evaluated: candidates.len(),
        screened_out,
        domains_checked: checks.len(),
        domains_available: available_domains.len(),
        new_good_results,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    write_report(deps, &pool, job_id, &report).await?;

    Ok(report)
}

/// A batch that produced nothing to check still consumes its slot and
/// leaves a report behind.
async fn finish_zero_work(
    deps: &SearchDeps,
    pool: &SqlitePool,
    job_id: &str,
    batch_num: i64,
    candidates_generated: usize,
    start: Instant,
) -> Result<BatchReport> {
    let report = BatchReport {
        batch_num,
        candidates_generated,
        candidates_evaluated: 0,
        screened_out: 0,
        domains_checked: 0,
        domains_available: 0,
        new_good_results: 0,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    write_report(deps, pool, job_id, &report).await?;
    Ok(report)
}

async fn write_report(
    deps: &SearchDeps,
    pool: &SqlitePool,
    job_id: &str,
    report: &BatchReport,
) -> Result<()> {
    let content = serde_json::to_string(report)?;
    SearchArtifact::insert(pool, report.batch_num, ArtifactType::BatchReport, &content).await?;

    let good_results = DomainRecord::good_count(pool).await?;
    deps.stream_hub
        .publish(
            job_id,
            SearchEvent::BatchCompleted {
                batch_num: report.batch_num,
                domains_checked: report.domains_checked as i64,
                domains_available: report.domains_available as i64,
                good_results,
            },
        )
        .await;

    info!(
        job_id,
        batch_num = report.batch_num,
        generated = report.candidates_generated,
        checked = report.domains_checked,
        available = report.domains_available,
        good = report.new_good_results,
        duration_ms = report.duration_ms,
        "batch complete"
    );

    Ok(())
}

/// Build the bounded learning context for the generator.
fn build_context(prior: &[DomainRecord], target_count: i64) -> PreviousResults {
    let checked_total = prior.len() as i64;

    let available: Vec<&DomainRecord> = prior
        .iter()
        .filter(|r| r.status == Availability::Available)
        .collect();
    let available_total = available.len() as i64;

    // Top 3 TLDs among checked-but-registered domains
    let mut taken_counts: HashMap<String, usize> = HashMap::new();
    for record in prior.iter().filter(|r| r.status == Availability::Registered) {
        *taken_counts.entry(record.tld.clone()).or_default() += 1;
    }
    let mut taken_tlds: Vec<(String, usize)> = taken_counts.into_iter().collect();
    taken_tlds.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    taken_tlds.truncate(3);

    // Keep the prompt bounded as history grows: last 50 checked, last 20
    // available
    let checked: Vec<String> = prior
        .iter()
        .rev()
        .take(50)
        .map(|r| r.domain.clone())
        .collect();
    let available: Vec<String> = available
        .iter()
        .rev()
        .take(20)
        .map(|r| r.domain.clone())
        .collect();

    PreviousResults {
        checked,
        available,
        checked_total,
        available_total,
        target_count,
        taken_tlds,
    }
}

/// Persist a candidate that failed screening: status unknown, never checked.
async fn persist_screened_out(
    pool: &SqlitePool,
    batch_num: i64,
    evaluation: &DomainEvaluation,
) -> Result<()> {
    let mut record = DomainRecord::new(
        &evaluation.domain,
        batch_num,
        Availability::Unknown,
        evaluation.score,
    );

    let mut flags = evaluation.flags.clone();
    flags.push(SCREENED_OUT_FLAG.to_string());
    record.flags = Json(flags);
    record.evaluation_data = Some(Json(EvaluationData {
        pronounceable: evaluation.pronounceable,
        memorable: evaluation.memorable,
        brand_fit: evaluation.brand_fit,
        email_friendly: evaluation.email_friendly,
        worth_checking: evaluation.worth_checking,
        notes: evaluation.notes.clone(),
        ..Default::default()
    }));

    record.upsert(pool).await
}

/// Build the persisted row for a checked domain.
fn build_record(
    batch_num: i64,
    check: &rdap_client::DomainCheck,
    evaluation: Option<&DomainEvaluation>,
    price: Option<&DomainPrice>,
) -> DomainRecord {
    let score = evaluation.map(|e| e.score).unwrap_or(0.5);
    let mut record = DomainRecord::new(&check.domain, batch_num, check.status.into(), score);

    record.price_cents = price.map(|p| p.price_cents);
    if let Some(evaluation) = evaluation {
        record.flags = Json(evaluation.flags.clone());
    }

    let category = PriceCategory::for_price(record.price_cents);
    record.evaluation_data = Some(Json(EvaluationData {
        pronounceable: evaluation.map(|e| e.pronounceable).unwrap_or(true),
        memorable: evaluation.map(|e| e.memorable).unwrap_or(true),
        brand_fit: evaluation.map(|e| e.brand_fit).unwrap_or(true),
        email_friendly: evaluation.map(|e| e.email_friendly).unwrap_or(true),
        worth_checking: evaluation.map(|e| e.worth_checking).unwrap_or(true),
        notes: evaluation.map(|e| e.notes.clone()).unwrap_or_default(),
        registrar: check.registrar.clone(),
        expiration: check.expiration.clone(),
        price_category: Some(category),
        renewal_cents: price.and_then(|p| p.renewal_cents),
    }));

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdap_client::DomainCheck;

    fn record(domain: &str, status: Availability) -> DomainRecord {
        DomainRecord::new(domain, 1, status, 0.5)
    }

    #[test]
    fn test_build_context_bounds_and_taken_tlds() {
        let mut prior = Vec::new();
        for i in 0..80 {
            prior.push(record(&format!("taken{i}.com"), Availability::Registered));
        }
        for i in 0..30 {
            prior.push(record(&format!("open{i}.io"), Availability::Available));
        }
        prior.push(record("mystery.dev", Availability::Unknown));
        prior.push(record("gone.net", Availability::Registered));
        prior.push(record("gone2.net", Availability::Registered));

        let context = build_context(&prior, 25);

        assert_eq!(context.checked_total, 113);
        assert_eq!(context.available_total, 30);
        assert_eq!(context.checked.len(), 50);
        assert_eq!(context.available.len(), 20);
        assert_eq!(context.taken_tlds.len(), 2);
        assert_eq!(context.taken_tlds[0], ("com".to_string(), 80));
        assert_eq!(context.taken_tlds[1], ("net".to_string(), 2));
    }

    #[test]
    fn test_build_record_available_with_price() {
        let mut check = DomainCheck::available("sunrise.co");
        check.registrar = None;
        let evaluation = DomainEvaluation {
            domain: "sunrise.co".into(),
            score: 0.9,
            worth_checking: true,
            pronounceable: true,
            memorable: true,
            brand_fit: true,
            email_friendly: true,
            flags: vec![],
            notes: "clean".into(),
        };
        let price = DomainPrice {
            price_cents: 2400,
            renewal_cents: Some(2900),
        };

        let record = build_record(2, &check, Some(&evaluation), Some(&price));

        assert_eq!(record.status, Availability::Available);
        assert_eq!(record.price_cents, Some(2400));
        assert_eq!(record.score, 0.9);
        let data = record.evaluation_data.unwrap().0;
        assert_eq!(data.price_category, Some(PriceCategory::Bundled));
        assert_eq!(data.renewal_cents, Some(2900));
    }

    #[test]
    fn test_build_record_registered_keeps_registrar() {
        let mut check = DomainCheck::registered("taken.com");
        check.registrar = Some("Porkbun LLC".into());
        check.expiration = Some("2027-03-02".into());

        let record = build_record(1, &check, None, None);

        assert_eq!(record.status, Availability::Registered);
        assert_eq!(record.score, 0.5); // missing evaluation defaults
        let data = record.evaluation_data.unwrap().0;
        assert_eq!(data.registrar.as_deref(), Some("Porkbun LLC"));
        assert_eq!(data.price_category, Some(PriceCategory::Unknown));
    }
}
