//! Full adapter stack: HTTP generation endpoint -> orchestrator -> SQLite store
//!
//! Delays are shrunk to milliseconds so the batch runs on real time.

use std::sync::Arc;

use bulkgen_core::application::{NoopReporter, Orchestrator, OrchestratorConfig};
use bulkgen_core::domain::{
    ErrorKind, GroupMeta, GroupState, JobDescriptor, JobPayload, JobStatus, RunPhase,
};
use bulkgen_core::port::time_provider::SystemTimeProvider;
use bulkgen_infra_http::{HttpGenerationClient, HttpGenerationConfig};
use bulkgen_infra_sqlite::{create_pool, run_migrations, SqliteArtifactStore};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        inter_job_delay_ms: 0,
        retry_backoff_ms: 10,
        pause_poll_interval_ms: 5,
        ..Default::default()
    }
}

fn lesson(id: &str, unit: &str, order_key: i64) -> JobDescriptor {
    JobDescriptor::new(id, unit, order_key, JobPayload::new(json!({ "topic": id })))
}

fn units() -> Vec<GroupMeta> {
    vec![
        GroupMeta::new("unit-1", "Unit 1: Greetings"),
        GroupMeta::new("unit-2", "Unit 2: Numbers"),
    ]
}

fn lessons() -> Vec<JobDescriptor> {
    vec![
        lesson("l1", "unit-1", 1),
        lesson("l2", "unit-1", 2),
        lesson("l3", "unit-2", 3),
        lesson("l4", "unit-2", 4),
    ]
}

async fn setup(server: &MockServer) -> (Arc<Orchestrator>, Arc<SqliteArtifactStore>) {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let time_provider = Arc::new(SystemTimeProvider);
    let store = Arc::new(SqliteArtifactStore::new(pool, time_provider.clone()));

    let generator = HttpGenerationClient::new(&HttpGenerationConfig {
        endpoint: format!("{}/v1/generate", server.uri()),
        api_key: Some("test-key".to_string()),
        timeout_secs: 5,
    })
    .unwrap();

    let orchestrator = Orchestrator::new(
        fast_config(),
        Arc::new(generator),
        store.clone(),
        Arc::new(NoopReporter),
        time_provider,
    )
    .unwrap();
    (Arc::new(orchestrator), store)
}

async fn mount_success(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lesson": "Generated content"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_batch_lands_in_sqlite_in_order() {
    let server = MockServer::start().await;
    mount_success(&server).await;
    let (orchestrator, store) = setup(&server).await;

    orchestrator.initialize(lessons(), units()).unwrap();
    let stats = orchestrator.start().await;

    assert_eq!(stats.phase, RunPhase::Finished);
    assert_eq!(stats.succeeded, 4);
    assert_eq!(store.count_artifacts().await.unwrap(), 4);

    let stored: Vec<String> = store
        .list_artifacts(None)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.job_id)
        .collect();
    assert_eq!(stored, vec!["l1", "l2", "l3", "l4"]);

    let l3 = store.find_artifact("l3").await.unwrap().unwrap();
    assert_eq!(l3.artifact, json!({"lesson": "Generated content"}));
    assert_eq!(l3.payload, json!({"topic": "l3"}));

    for group in orchestrator.group_statuses() {
        assert_eq!(group.status, GroupState::Succeeded, "group {}", group.key);
    }
}

#[tokio::test]
async fn test_http_429_is_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"topic": "l2"})))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_success(&server).await;
    let (orchestrator, store) = setup(&server).await;

    orchestrator.initialize(lessons(), units()).unwrap();
    let stats = orchestrator.start().await;

    assert_eq!(stats.phase, RunPhase::Finished);
    assert_eq!(stats.succeeded, 4);
    let l2 = orchestrator.job_record("l2").unwrap();
    assert_eq!(l2.status, JobStatus::Succeeded);
    assert_eq!(l2.attempt, 3);
    assert_eq!(store.count_artifacts().await.unwrap(), 4);
}

#[tokio::test]
async fn test_http_402_cancels_the_rest_of_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"topic": "l2"})))
        .respond_with(ResponseTemplate::new(402).set_body_string("quota exhausted"))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_success(&server).await;
    let (orchestrator, store) = setup(&server).await;

    orchestrator.initialize(lessons(), units()).unwrap();
    let stats = orchestrator.start().await;

    assert_eq!(stats.phase, RunPhase::Cancelled);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.never_attempted, 2);

    let l2 = orchestrator.job_record("l2").unwrap();
    let error = l2.last_error.unwrap();
    assert_eq!(error.kind, ErrorKind::Fatal);
    assert!(error.message.contains("quota exhausted"));

    // Only the job before the fatal error was stored
    assert_eq!(store.count_artifacts().await.unwrap(), 1);

    let groups = orchestrator.group_statuses();
    assert_eq!(groups[0].status, GroupState::Failed);
    assert_eq!(groups[1].status, GroupState::Cancelled);
}

#[tokio::test]
async fn test_server_error_fails_only_that_lesson() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"topic": "l3"})))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_success(&server).await;
    let (orchestrator, store) = setup(&server).await;

    orchestrator.initialize(lessons(), units()).unwrap();
    let stats = orchestrator.start().await;

    assert_eq!(stats.phase, RunPhase::Finished);
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.failed, 1);
    assert_eq!(orchestrator.job_record("l3").unwrap().attempt, 1);
    assert!(store.find_artifact("l3").await.unwrap().is_none());

    let groups = orchestrator.group_statuses();
    assert_eq!(groups[0].status, GroupState::Succeeded);
    assert_eq!(groups[1].status, GroupState::Failed);
}
