//! Pause, resume and cancel against a real SQLite store

use std::sync::Arc;

use bulkgen_core::application::{ChannelReporter, Orchestrator, OrchestratorConfig};
use bulkgen_core::domain::{GroupMeta, JobDescriptor, JobPayload, JobStatus, RunPhase};
use bulkgen_core::port::generation::mocks::ScriptedGenerator;
use bulkgen_core::port::time_provider::SystemTimeProvider;
use bulkgen_core::port::{CancelReason, ProgressEvent};
use bulkgen_infra_sqlite::{create_pool, run_migrations, SqliteArtifactStore};
use serde_json::json;

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        inter_job_delay_ms: 0,
        retry_backoff_ms: 10,
        pause_poll_interval_ms: 5,
        ..Default::default()
    }
}

fn lessons(count: usize) -> Vec<JobDescriptor> {
    (1..=count)
        .map(|i| {
            let id = format!("l{}", i);
            let payload = JobPayload::new(json!({ "topic": id }));
            JobDescriptor::new(id, "unit-1", i as i64, payload)
        })
        .collect()
}

struct Stack {
    orchestrator: Arc<Orchestrator>,
    generator: Arc<ScriptedGenerator>,
    store: Arc<SqliteArtifactStore>,
}

async fn stack(generator: ScriptedGenerator, reporter: ChannelReporter) -> Stack {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let time_provider = Arc::new(SystemTimeProvider);
    let store = Arc::new(SqliteArtifactStore::new(pool, time_provider.clone()));
    let generator = Arc::new(generator);

    let orchestrator = Orchestrator::new(
        fast_config(),
        generator.clone(),
        store.clone(),
        Arc::new(reporter),
        time_provider,
    )
    .unwrap();

    Stack {
        orchestrator: Arc::new(orchestrator),
        generator,
        store,
    }
}

#[tokio::test]
async fn test_pause_and_resume_mid_batch() {
    let generator = ScriptedGenerator::new();
    let hold = generator.hold("l2");
    let (reporter, _rx) = ChannelReporter::new(256);
    let s = stack(generator, reporter).await;
    s.orchestrator
        .initialize(lessons(4), vec![GroupMeta::new("unit-1", "Unit 1")])
        .unwrap();

    let orchestrator = s.orchestrator.clone();
    let run = tokio::spawn(async move { orchestrator.start().await });

    hold.entered().await;
    assert!(s.orchestrator.pause());
    hold.release();

    let mut phase = s.orchestrator.subscribe_phase();
    phase.wait_for(|p| *p == RunPhase::Paused).await.unwrap();

    // l2 was in flight and completed; nothing after it started
    assert_eq!(s.store.count_artifacts().await.unwrap(), 2);
    assert_eq!(
        s.orchestrator.job_record("l3").unwrap().status,
        JobStatus::Pending
    );

    assert!(s.orchestrator.resume());
    let stats = run.await.unwrap();

    assert_eq!(stats.phase, RunPhase::Finished);
    assert_eq!(stats.succeeded, 4);
    assert_eq!(s.store.count_artifacts().await.unwrap(), 4);
    assert_eq!(s.generator.calls(), vec!["l1", "l2", "l3", "l4"]);
}

#[tokio::test]
async fn test_cancel_then_rerun_the_skipped_jobs() {
    let generator = ScriptedGenerator::new();
    let hold = generator.hold("l2");
    let (reporter, mut rx) = ChannelReporter::new(256);
    let s = stack(generator, reporter).await;
    s.orchestrator
        .initialize(lessons(5), vec![GroupMeta::new("unit-1", "Unit 1")])
        .unwrap();

    let orchestrator = s.orchestrator.clone();
    let run = tokio::spawn(async move { orchestrator.start().await });

    hold.entered().await;
    assert!(s.orchestrator.cancel());
    hold.release();

    let stats = run.await.unwrap();
    assert_eq!(stats.phase, RunPhase::Cancelled);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.skipped, 3);
    assert_eq!(s.store.count_artifacts().await.unwrap(), 2);

    let mut cancelled = None;
    while let Ok(snapshot) = rx.try_recv() {
        if let ProgressEvent::RunCancelled { reason, skipped } = snapshot.event {
            cancelled = Some((reason, skipped));
        }
    }
    assert_eq!(cancelled, Some((CancelReason::Requested, 3)));

    // A fresh batch of the skipped jobs completes the set
    let skipped: Vec<JobDescriptor> = s
        .orchestrator
        .job_records()
        .into_iter()
        .filter(|r| r.status == JobStatus::Skipped)
        .map(|r| r.descriptor)
        .collect();
    assert_eq!(skipped.len(), 3);

    s.orchestrator
        .initialize(skipped, vec![GroupMeta::new("unit-1", "Unit 1")])
        .unwrap();
    let stats = s.orchestrator.start().await;

    assert_eq!(stats.phase, RunPhase::Finished);
    assert_eq!(stats.succeeded, 3);
    assert_eq!(s.store.count_artifacts().await.unwrap(), 5);
}
