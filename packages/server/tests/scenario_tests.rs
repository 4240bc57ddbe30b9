//! End-to-end scenarios: the full controller + pipeline + scheduler loop
//! against scripted providers and stubbed lookups.

mod common;

use common::{generation_reply, scripted_domains, CheckerMode, HarnessBuilder};
use llm_client::{MockProvider, ScriptStep};
use search_core::domains::search::{ArtifactType, BatchReport, JobStatus, SearchArtifact, SearchJob};

/// Happy path: one batch finds enough good results and completes.
#[tokio::test]
async fn happy_path_completes_in_one_batch() {
    let domains = scripted_domains(30);
    let harness = HarnessBuilder::new()
        .driver(MockProvider::with_script([ScriptStep::Content(
            generation_reply(&domains),
        )]))
        .checker(CheckerMode::AllAvailable)
        .build()
        .await;

    harness.start_job("job-happy").await;
    let status = harness.run_until_settled("job-happy").await;
    assert_eq!(status, JobStatus::Complete);

    let snapshot = harness.controller.status("job-happy").await.unwrap();
    assert_eq!(snapshot.batch_num, 1);
    assert_eq!(snapshot.domains_checked, 30);
    assert!(snapshot.good_results >= 25);
    assert!(snapshot.total_output_tokens > 0);

    let results = harness.controller.results("job-happy").await.unwrap();
    assert_eq!(results.domains.len(), 30);
    assert!(results.domains.len() <= 50);
    for pair in results.domains.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert_eq!(results.pricing_histogram.get("bundled"), Some(&30));

    // Completion email went out once
    assert_eq!(
        harness.mailer.results_sent.load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

/// Exhaustion: too few available domains per batch; after the budget runs
/// out the job solicits follow-up input.
#[tokio::test]
async fn exhaustion_solicits_followup() {
    let domains = scripted_domains(30);
    let harness = HarnessBuilder::new()
        .driver(MockProvider::with_script([ScriptStep::Content(
            generation_reply(&domains),
        )]))
        .checker(CheckerMode::AvailablePrefix(2))
        .build()
        .await;

    harness.start_job("job-exhausted").await;
    let status = harness.run_until_settled("job-exhausted").await;
    assert_eq!(status, JobStatus::NeedsFollowup);

    let snapshot = harness.controller.status("job-exhausted").await.unwrap();
    assert_eq!(snapshot.batch_num, 6);
    assert!(snapshot.good_results < 25);

    // The follow-up quiz has three questions
    let quiz = harness.controller.followup("job-exhausted").await.unwrap();
    let questions = quiz["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);

    assert_eq!(
        harness.mailer.followups_sent.load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

/// Resume: back to running with a fresh budget; the next timer runs exactly
/// one batch.
#[tokio::test]
async fn resume_runs_a_new_batch() {
    let harness = HarnessBuilder::new()
        .checker(CheckerMode::AvailablePrefix(2))
        .build()
        .await;

    harness.start_job("job-resume").await;
    assert_eq!(
        harness.run_until_settled("job-resume").await,
        JobStatus::NeedsFollowup
    );

    let responses = serde_json::json!({
        "followup_direction": "different_tld",
        "followup_length": "longer_ok",
        "followup_keywords": "local"
    });
    let snapshot = harness
        .controller
        .resume("job-resume", responses)
        .await
        .unwrap();
    assert_eq!(snapshot.status, JobStatus::Running);
    assert_eq!(snapshot.batch_num, 6);

    // One timer firing, exactly one more batch
    harness.scheduler.fire_due_jobs().await;
    let snapshot = harness.controller.status("job-resume").await.unwrap();
    assert_eq!(snapshot.batch_num, 7);

    // Responses are recorded on the job row
    let pool = harness.deps.stores.open("job-resume").await.unwrap();
    let job = SearchJob::get(&pool).await.unwrap();
    let recorded = job.followup_responses.unwrap();
    assert_eq!(recorded.0["followup_direction"], "different_tld");
}

/// Cancel before any batch: the pending timer firing is a no-op and no
/// result rows ever appear.
#[tokio::test]
async fn cancel_before_first_batch() {
    let harness = HarnessBuilder::new().build().await;

    harness.start_job("job-cancel").await;
    harness.controller.cancel("job-cancel").await.unwrap();

    harness.scheduler.fire_due_jobs().await;

    let snapshot = harness.controller.status("job-cancel").await.unwrap();
    assert_eq!(snapshot.status, JobStatus::Cancelled);
    assert_eq!(snapshot.batch_num, 0);
    assert_eq!(snapshot.domains_checked, 0);

    // Already terminal: a second cancel is rejected
    assert!(harness.controller.cancel("job-cancel").await.is_err());
}

/// Generator outage: the batch records zero work, consumes its slot, and
/// the search keeps going.
#[tokio::test]
async fn generator_failure_degrades_to_zero_work_batch() {
    let harness = HarnessBuilder::new()
        .driver(MockProvider::with_script([ScriptStep::Fail(
            "provider outage".into(),
        )]))
        .build()
        .await;

    harness.start_job("job-degraded").await;
    harness.scheduler.fire_due_jobs().await;

    let snapshot = harness.controller.status("job-degraded").await.unwrap();
    assert_eq!(snapshot.status, JobStatus::Running);
    assert_eq!(snapshot.batch_num, 1);
    assert_eq!(snapshot.domains_checked, 0);

    let pool = harness.deps.stores.open("job-degraded").await.unwrap();
    let artifact = SearchArtifact::latest(&pool, ArtifactType::BatchReport)
        .await
        .unwrap()
        .expect("zero-work batch still writes a report");
    let report: BatchReport = serde_json::from_str(&artifact.content).unwrap();
    assert_eq!(report.batch_num, 1);
    assert_eq!(report.candidates_generated, 0);
    assert_eq!(report.domains_checked, 0);

    // The next batch is scheduled
    let job = SearchJob::get(&pool).await.unwrap();
    assert!(job.wake_at.is_some());
}

/// Availability adapter fault: fatal. The job fails, the error is recorded,
/// and no further batches run.
#[tokio::test]
async fn availability_fault_fails_job() {
    let harness = HarnessBuilder::new()
        .checker(CheckerMode::Fail)
        .build()
        .await;

    harness.start_job("job-fatal").await;
    harness.scheduler.fire_due_jobs().await;

    let snapshot = harness.controller.status("job-fatal").await.unwrap();
    assert_eq!(snapshot.status, JobStatus::Failed);
    assert_eq!(snapshot.batch_num, 1);
    assert!(snapshot.error.as_deref().unwrap_or("").contains("availability"));

    // Timer disarmed; further firings change nothing
    harness.scheduler.fire_due_jobs().await;
    let snapshot = harness.controller.status("job-fatal").await.unwrap();
    assert_eq!(snapshot.batch_num, 1);
}

/// Screened-out candidates are persisted as unknown so later batches do not
/// regenerate them.
#[tokio::test]
async fn screened_out_candidates_are_persisted() {
    let domains = scripted_domains(10);
    let harness = HarnessBuilder::new()
        .driver(MockProvider::with_script([ScriptStep::Content(
            generation_reply(&domains),
        )]))
        // Low fixed score: nothing admitted to the availability check
        .swarm(MockProvider::new().with_eval_score(0.2))
        .target_results(5)
        .build()
        .await;

    harness.start_job("job-screened").await;
    harness.scheduler.fire_due_jobs().await;

    let snapshot = harness.controller.status("job-screened").await.unwrap();
    assert_eq!(snapshot.status, JobStatus::Running);
    // All ten persisted with status unknown, none available
    assert_eq!(snapshot.domains_checked, 10);
    assert_eq!(snapshot.domains_available, 0);

    use search_core::domains::search::DomainRecord;
    let pool = harness.deps.stores.open("job-screened").await.unwrap();
    let record = DomainRecord::find(&pool, &domains[0]).await.unwrap().unwrap();
    assert!(record.flags.0.contains(&"screened_out".to_string()));
}
