//! Integration tests for the durable store
//!
//! Covers schema setup, scan commits, checkpoint persistence across reopen,
//! the explicit stats reset and the visit ledger cooldown.

use chrono::{Duration, TimeZone, Utc};
use revisit_core::{
    Checkpoint, CheckpointStore, EventType, Fingerprint, NeighborStats, StatsDelta, StatsStore,
    VisitLedger,
};
use revisit_store::Database;
use tempfile::TempDir;

/// Helper to create a temporary database for testing
async fn create_test_db() -> (Database, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = Database::open(dir.path().join("revisit.db"))
        .await
        .expect("Failed to open database");
    db.init_schema().await.expect("Failed to init schema");
    (db, dir)
}

fn checkpoint(fps: &[&str]) -> Checkpoint {
    Checkpoint {
        fingerprints: fps.iter().map(|s| Fingerprint(s.to_string())).collect(),
        last_sync_at: Some(Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()),
    }
}

#[tokio::test]
async fn test_fresh_store_is_empty() {
    let (db, _dir) = create_test_db().await;

    assert_eq!(db.load_checkpoint().await.unwrap(), Checkpoint::default());
    assert!(db.all_stats().await.unwrap().is_empty());
    assert!(db.all_visits().await.unwrap().is_empty());

    // init_schema is idempotent
    db.init_schema().await.unwrap();
}

#[tokio::test]
async fn test_commit_scan_accumulates_and_replaces_checkpoint() {
    let (db, _dir) = create_test_db().await;

    let mut first = StatsDelta::default();
    first.record("alice", EventType::Comment);
    first.record("alice", EventType::Like);
    first.record("bob", EventType::Reply);
    db.commit_scan(&first, &checkpoint(&["a1", "a2", "a3"]))
        .await
        .unwrap();

    let mut second = StatsDelta::default();
    second.record("alice", EventType::Comment);
    db.commit_scan(&second, &checkpoint(&["b1", "a1", "a2"]))
        .await
        .unwrap();

    let stats = db.all_stats().await.unwrap();
    assert_eq!(
        stats,
        vec![
            NeighborStats::new("alice", 1, 2, 0),
            NeighborStats::new("bob", 0, 0, 1),
        ]
    );

    let stored = db.load_checkpoint().await.unwrap();
    assert_eq!(stored, checkpoint(&["b1", "a1", "a2"]));
}

#[tokio::test]
async fn test_empty_commit_keeps_stats() {
    let (db, _dir) = create_test_db().await;

    let mut delta = StatsDelta::default();
    delta.record("carol", EventType::Like);
    db.commit_scan(&delta, &checkpoint(&["c1"])).await.unwrap();
    db.commit_scan(&StatsDelta::default(), &checkpoint(&["c1"]))
        .await
        .unwrap();

    assert_eq!(
        db.all_stats().await.unwrap(),
        vec![NeighborStats::new("carol", 1, 0, 0)]
    );
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("revisit.db");

    {
        let db = Database::open(&path).await.unwrap();
        db.init_schema().await.unwrap();
        let mut delta = StatsDelta::default();
        delta.record("dave", EventType::Reply);
        db.commit_scan(&delta, &checkpoint(&["d1", "d2"]))
            .await
            .unwrap();
        db.record_engagement("dave", Utc::now()).await.unwrap();
    }

    let db = Database::open(&path).await.unwrap();
    db.init_schema().await.unwrap();
    assert_eq!(db.load_checkpoint().await.unwrap(), checkpoint(&["d1", "d2"]));
    assert_eq!(
        db.all_stats().await.unwrap(),
        vec![NeighborStats::new("dave", 0, 0, 1)]
    );
    assert_eq!(db.visit("dave").await.unwrap().unwrap().count, 1);
}

#[tokio::test]
async fn test_reset_stats_is_explicit() {
    let (db, _dir) = create_test_db().await;

    let mut delta = StatsDelta::default();
    delta.record("erin", EventType::Like);
    delta.record("frank", EventType::Comment);
    db.commit_scan(&delta, &checkpoint(&["e1"])).await.unwrap();

    assert_eq!(db.reset_stats().await.unwrap(), 2);
    assert!(db.all_stats().await.unwrap().is_empty());
    // checkpoint is untouched by a stats reset
    assert_eq!(db.load_checkpoint().await.unwrap(), checkpoint(&["e1"]));
}

#[tokio::test]
async fn test_visit_ledger_cooldown() {
    let (db, _dir) = create_test_db().await;
    let day0 = Utc.with_ymd_and_hms(2026, 6, 10, 23, 15, 0).unwrap();

    assert!(db.can_engage("grace", 3, day0).await.unwrap());

    db.record_engagement("grace", day0).await.unwrap();
    assert!(!db.can_engage("grace", 3, day0 + Duration::days(1)).await.unwrap());
    assert!(!db.can_engage("grace", 3, day0 + Duration::days(2)).await.unwrap());
    assert!(db.can_engage("grace", 3, day0 + Duration::days(3)).await.unwrap());

    let later = day0 + Duration::days(4);
    db.record_engagement("grace", later).await.unwrap();
    let record = db.visit("grace").await.unwrap().unwrap();
    assert_eq!(record.count, 2);
    assert_eq!(record.last_engaged_at, Some(later));
}

#[tokio::test]
async fn test_list_visits_most_recent_first() {
    let (db, _dir) = create_test_db().await;
    let base = Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap();

    db.record_engagement("older", base).await.unwrap();
    db.record_engagement("newer", base + Duration::days(2)).await.unwrap();

    let names: Vec<String> = db
        .all_visits()
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.counterparty)
        .collect();
    assert_eq!(names, vec!["newer".to_string(), "older".to_string()]);
}
