use std::sync::Arc;

use refpack::embeddings::EmbeddingProvider;
use refpack::indexing::{IndexScope, IndexingError, JobStatus, LEASE_EXPIRED};
use refpack::storage::Store;
use refpack::vcs::SnapshotProvider;

use crate::helpers::test_harness::{test_config, CALC_PY};
use crate::helpers::{FailingEmbedder, TestHarness, TrippingSnapshot};

#[tokio::test]
async fn test_job_is_queryable_after_completion() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();

    let ticket = harness
        .engine
        .index_project_symbols(harness.project.id, None, Some("abc123".to_string()), false)
        .await
        .unwrap();
    let job_id = ticket.job_id;
    let finished = ticket.wait().await.unwrap();

    let stored = harness.engine.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.scope, IndexScope::Full);
    assert_eq!(stored.commit_hash.as_deref(), Some("abc123"));
    assert_eq!(stored.version, finished.version);
    assert!(stored.lease.is_none());

    let add = harness.symbol_named("add").await.unwrap();
    assert_eq!(add.commit_hash.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_missing_project_fails_job() {
    let harness = TestHarness::new().await.unwrap();

    let ticket = harness
        .engine
        .index_project_symbols(harness.project.id + 100, None, None, true)
        .await
        .unwrap();
    let job_id = ticket.job_id;
    let result = ticket.wait().await;
    assert!(matches!(result, Err(IndexingError::ProjectNotFound(_))));

    let job = harness.engine.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.finished_at.is_some());
    assert!(job.last_error.unwrap().contains("not found"));
}

#[tokio::test]
async fn test_embedding_outage_fails_job() {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FailingEmbedder);
    let harness = TestHarness::build(test_config(), |snapshot, _| snapshot, Some(embedder))
        .await
        .unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();

    let ticket = harness
        .engine
        .index_project_symbols(harness.project.id, None, None, true)
        .await
        .unwrap();
    let job_id = ticket.job_id;
    assert!(matches!(ticket.wait().await, Err(IndexingError::ExternalService(_))));

    let job = harness.engine.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.last_error.unwrap().starts_with("external service failure"));
}

#[tokio::test]
async fn test_store_outage_leaves_orphan_for_reaper() {
    let mut config = test_config();
    config.indexer.batch_size = 1;
    config.jobs.lease_ttl_secs = 0;
    let harness = TestHarness::build(
        config,
        |inner, store| {
            Arc::new(TrippingSnapshot {
                inner,
                store,
                trip_on: "b.py".to_string(),
            }) as Arc<dyn SnapshotProvider>
        },
        None,
    )
    .await
    .unwrap();
    harness.create_test_file("a.py", "def first():\n    return 1\n").unwrap();
    harness.create_test_file("b.py", "def second():\n    return 2\n").unwrap();

    let ticket = harness
        .engine
        .index_project_symbols(harness.project.id, None, None, true)
        .await
        .unwrap();
    let job_id = ticket.job_id;
    let result = ticket.wait().await;
    assert!(matches!(result, Err(IndexingError::Store(_))));

    // The failure could not be recorded, so the row still shows the last heartbeat.
    harness.store.set_unavailable(None).await;
    let stuck = harness.store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(stuck.status, JobStatus::Processing);
    assert_eq!(stuck.stats.files_processed, 1);

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let reaped = harness.engine.reap_orphaned_jobs().await.unwrap();
    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].id, job_id);

    let job = harness.engine.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.last_error.as_deref(), Some(LEASE_EXPIRED));

    // Nothing left to reap.
    assert!(harness.engine.reap_orphaned_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reaper_ignores_live_jobs() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.index_all().await.unwrap();

    assert!(harness.engine.reap_orphaned_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_job_update_is_rejected() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    let finished = harness.index_all().await.unwrap();

    let mut stale = finished.clone();
    stale.version -= 1;
    assert!(harness.store.update_job(&stale).await.is_err());
}

#[tokio::test]
async fn test_completed_job_cannot_restart() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    let mut finished = harness.index_all().await.unwrap();

    let result = finished.start("worker-b", chrono::Utc::now());
    assert!(matches!(
        result,
        Err(IndexingError::InvalidTransition {
            from: JobStatus::Completed,
            to: JobStatus::Processing
        })
    ));
}
