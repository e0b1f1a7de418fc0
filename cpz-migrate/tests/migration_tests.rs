//! Migration orchestrator integration tests
//!
//! Idempotency, conflict policy, batch isolation and cancellation against a
//! real SQLite database.

mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cpz_common::Error;
use cpz_migrate::db::{runs, zones};
use cpz_migrate::{MigrationOptions, MigrationOrchestrator, RunStatus};
use helpers::{canonical_feature, create_test_db, poison_inserts, write_canonical_file, zone_names};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn options(skip_if_exists: bool, replace_existing: bool, batch_size: usize) -> MigrationOptions {
    MigrationOptions {
        skip_if_exists,
        replace_existing,
        batch_size,
    }
}

fn features(names: &[&str]) -> Vec<cpz_common::CanonicalFeature> {
    names.iter().map(|name| canonical_feature(name, "Camden")).collect()
}

#[tokio::test]
async fn test_second_run_is_skipped() {
    let (dir, pool) = create_test_db().await.unwrap();
    let path = write_canonical_file(dir.path(), "merged.geojson", features(&["a", "b", "c"]));
    let orchestrator = MigrationOrchestrator::new(pool.clone(), MigrationOptions::default()).unwrap();

    let first = orchestrator.migrate(&path, CancellationToken::new()).await.unwrap();
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(first.total_features, 3);
    assert_eq!(first.counts.inserted, 3);

    let second = orchestrator.migrate(&path, CancellationToken::new()).await.unwrap();
    assert_eq!(second.status, RunStatus::Skipped);
    assert_eq!(second.total_features, 0);
    assert_eq!(second.counts.processed(), 0);

    assert_eq!(zones::count_zones(&pool, Some("merged.geojson")).await.unwrap(), 3);

    let history = runs::runs_for_source(&pool, "merged.geojson").await.unwrap();
    let statuses: Vec<_> = history.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![RunStatus::Completed, RunStatus::Skipped]);
}

#[tokio::test]
async fn test_rerun_without_replace_skips_existing_records() {
    let (dir, pool) = create_test_db().await.unwrap();
    let path = write_canonical_file(dir.path(), "merged.geojson", features(&["a", "b"]));
    let orchestrator = MigrationOrchestrator::new(pool.clone(), options(false, false, 500)).unwrap();

    orchestrator.migrate(&path, CancellationToken::new()).await.unwrap();
    let rerun = orchestrator.migrate(&path, CancellationToken::new()).await.unwrap();

    assert_eq!(rerun.status, RunStatus::Completed);
    assert_eq!(rerun.counts.skipped, 2);
    assert_eq!(rerun.counts.inserted, 0);
    assert_eq!(zones::count_zones(&pool, None).await.unwrap(), 2);
}

#[tokio::test]
async fn test_replace_yields_one_record_per_key() {
    let (dir, pool) = create_test_db().await.unwrap();

    // Partially loaded: only the first two features made it in
    let path = write_canonical_file(dir.path(), "merged.geojson", features(&["a", "b"]));
    MigrationOrchestrator::new(pool.clone(), MigrationOptions::default())
        .unwrap()
        .migrate(&path, CancellationToken::new())
        .await
        .unwrap();
    let ids_before: Vec<String> = sqlx::query_scalar("SELECT id FROM parking_zones ORDER BY source_index")
        .fetch_all(&pool)
        .await
        .unwrap();

    let path = write_canonical_file(dir.path(), "merged.geojson", features(&["a2", "b2", "c2", "d2"]));
    let run = MigrationOrchestrator::new(pool.clone(), options(false, true, 3))
        .unwrap()
        .migrate(&path, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.counts.replaced, 2);
    assert_eq!(run.counts.inserted, 2);
    assert_eq!(zones::count_zones(&pool, None).await.unwrap(), 4);
    assert_eq!(zone_names(&pool).await.unwrap(), vec!["a2", "b2", "c2", "d2"]);

    let ids_after: Vec<String> = sqlx::query_scalar("SELECT id FROM parking_zones ORDER BY source_index LIMIT 2")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(ids_after, ids_before);
}

#[tokio::test]
async fn test_identifier_keys_survive_reordering() {
    let (dir, pool) = create_test_db().await.unwrap();

    let with_id = |name: &str, id: u64| {
        let mut feature = canonical_feature(name, "Camden");
        feature.properties.insert_extension("identifier", json!(id));
        feature
    };

    let path = write_canonical_file(dir.path(), "camden_normalized.geojson", vec![with_id("A", 1), with_id("B", 2)]);
    let orchestrator = MigrationOrchestrator::new(pool.clone(), options(false, true, 500)).unwrap();
    orchestrator.migrate(&path, CancellationToken::new()).await.unwrap();

    let path = write_canonical_file(
        dir.path(),
        "camden_normalized.geojson",
        vec![with_id("B-renamed", 2), with_id("A-renamed", 1)],
    );
    let run = orchestrator.migrate(&path, CancellationToken::new()).await.unwrap();

    assert_eq!(run.counts.replaced, 2);
    assert_eq!(zones::count_zones(&pool, None).await.unwrap(), 2);

    let name: String = sqlx::query_scalar("SELECT name FROM parking_zones WHERE feature_key = 'identifier:1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(name, "A-renamed");
}

#[tokio::test]
async fn test_failed_batch_is_isolated() {
    let (dir, pool) = create_test_db().await.unwrap();
    poison_inserts(&pool, "POISON").await.unwrap();

    let path = write_canonical_file(dir.path(), "merged.geojson", features(&["a", "b", "POISON", "d", "e"]));
    let reports = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = reports.clone();

    let run = MigrationOrchestrator::new(pool.clone(), options(true, false, 2))
        .unwrap()
        .with_batch_observer(move |batch| seen.lock().unwrap().push(batch.clone()))
        .migrate(&path, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::CompletedWithErrors);
    assert_eq!(run.counts.inserted, 3);
    assert_eq!(run.counts.failed, 2);
    // The whole second batch rolled back, including "d"
    assert_eq!(zone_names(&pool).await.unwrap(), vec!["a", "b", "e"]);

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 3);
    assert!(reports[0].committed());
    assert!(!reports[1].committed());
    assert!(reports[1].error.as_deref().unwrap_or("").contains("poisoned record"));
    assert!(reports[2].committed());

    let stored = runs::load_run(&pool, run.run_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::CompletedWithErrors);
    assert_eq!(stored.counts, run.counts);
}

#[tokio::test]
async fn test_every_batch_failing_is_not_fatal() {
    let (dir, pool) = create_test_db().await.unwrap();
    poison_inserts(&pool, "POISON").await.unwrap();

    let path = write_canonical_file(dir.path(), "merged.geojson", features(&["POISON", "POISON", "POISON"]));
    let run = MigrationOrchestrator::new(pool.clone(), options(true, false, 1))
        .unwrap()
        .migrate(&path, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::CompletedWithErrors);
    assert_eq!(run.counts.inserted, 0);
    assert_eq!(run.counts.failed, 3);

    // A partially failed run still counts as migrated for skip_if_exists
    let again = MigrationOrchestrator::new(pool.clone(), MigrationOptions::default())
        .unwrap()
        .migrate(&path, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again.status, RunStatus::Skipped);
}

#[tokio::test]
async fn test_cancelled_before_first_batch() {
    let (dir, pool) = create_test_db().await.unwrap();
    let path = write_canonical_file(dir.path(), "merged.geojson", features(&["a", "b"]));

    let token = CancellationToken::new();
    token.cancel();
    let run = MigrationOrchestrator::new(pool.clone(), MigrationOptions::default())
        .unwrap()
        .migrate(&path, token)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.total_features, 2);
    assert_eq!(run.counts.processed(), 0);
    assert_eq!(zones::count_zones(&pool, None).await.unwrap(), 0);

    let stored = runs::load_run(&pool, run.run_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Cancelled);
    assert!(stored.ended_at.is_some());
}

#[tokio::test]
async fn test_cancel_between_batches_keeps_partial_progress() {
    let (dir, pool) = create_test_db().await.unwrap();
    let path = write_canonical_file(dir.path(), "merged.geojson", features(&["a", "b", "c", "d", "e"]));

    let token = CancellationToken::new();
    let observer_token = token.clone();
    let batches = Arc::new(AtomicUsize::new(0));
    let seen = batches.clone();

    let run = MigrationOrchestrator::new(pool.clone(), options(true, false, 2))
        .unwrap()
        .with_batch_observer(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            observer_token.cancel();
        })
        .migrate(&path, token)
        .await
        .unwrap();

    assert_eq!(batches.load(Ordering::SeqCst), 1);
    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.counts.inserted, 2);
    assert_eq!(zones::count_zones(&pool, None).await.unwrap(), 2);

    // A cancelled run does not count as migrated; the next run picks up the rest
    let resumed = MigrationOrchestrator::new(pool.clone(), MigrationOptions::default())
        .unwrap()
        .migrate(&path, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(resumed.status, RunStatus::Completed);
    assert_eq!(resumed.counts.skipped, 2);
    assert_eq!(resumed.counts.inserted, 3);
    assert_eq!(zones::count_zones(&pool, None).await.unwrap(), 5);
}

#[tokio::test]
async fn test_invalid_file_is_fatal_without_run_log() {
    let (dir, pool) = create_test_db().await.unwrap();
    let path = dir.path().join("merged.geojson");
    std::fs::write(&path, r#"{"type": "FeatureCollection", "features": [{"type": "Feature""#).unwrap();

    let err = MigrationOrchestrator::new(pool.clone(), MigrationOptions::default())
        .unwrap()
        .migrate(&path, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(runs::runs_for_source(&pool, "merged.geojson").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_file_is_fatal() {
    let (dir, pool) = create_test_db().await.unwrap();

    let result = MigrationOrchestrator::new(pool.clone(), MigrationOptions::default())
        .unwrap()
        .migrate(&dir.path().join("absent.geojson"), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_zero_batch_size_rejected() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let result = MigrationOrchestrator::new(pool, options(true, false, 0));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_empty_collection_completes() {
    let (dir, pool) = create_test_db().await.unwrap();
    let path = write_canonical_file(dir.path(), "empty.geojson", Vec::new());

    let run = MigrationOrchestrator::new(pool.clone(), MigrationOptions::default())
        .unwrap()
        .migrate(&path, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.total_features, 0);
}

#[tokio::test]
async fn test_stored_record_carries_geometry_bbox_and_extensions() {
    let (dir, pool) = create_test_db().await.unwrap();
    let mut feature = canonical_feature("Belsize", "Camden");
    feature.properties.insert_extension("zone_code", json!("CA-B"));
    let path = write_canonical_file(dir.path(), "camden_normalized.geojson", vec![feature]);

    MigrationOrchestrator::new(pool.clone(), MigrationOptions::default())
        .unwrap()
        .migrate(&path, CancellationToken::new())
        .await
        .unwrap();

    let (geometry_type, min_lon, max_lat, extensions, bays): (String, f64, f64, String, i64) = sqlx::query_as(
        "SELECT geometry_type, min_lon, max_lat, extensions, bays FROM parking_zones",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(geometry_type, "Point");
    assert_eq!(min_lon, -0.14);
    assert_eq!(max_lat, 51.55);
    assert_eq!(extensions, r#"{"zone_code":"CA-B"}"#);
    assert_eq!(bays, 2);
}
