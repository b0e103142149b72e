//! End-to-end snapshot hot-reload: file watcher -> reload loop -> pool
//! reconcile, with invalid files leaving the prior pool active.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use wbalance::config::watcher::{process_snapshot_changes, SnapshotWatcher};
use wbalance::config::load_snapshot;
use wbalance::Balancer;

/// Surface reload-loop logs when RUST_LOG is set while debugging these
/// tests. Safe to call once per test; later calls are no-ops.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

const INITIAL: &str = r#"[
    {"name":"b1", "Addr":"127.0.0.1", "Port":80, "weight":3},
    {"name":"b2", "Addr":"127.0.0.1", "Port":81, "weight":2}
]"#;

const UPDATED: &str = r#"[
    {"name":"b2", "Addr":"127.0.0.1", "Port":81, "weight":5},
    {"name":"b4", "Addr":"127.0.0.1", "Port":83, "weight":1}
]"#;

async fn wait_for<F: Fn() -> bool>(cond: F) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached within timeout");
}

#[tokio::test]
async fn reload_applies_new_snapshot_and_keeps_counters() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backends.json");
    fs::write(&path, INITIAL).unwrap();

    let balancer = Arc::new(Balancer::new(&load_snapshot(&path).unwrap()).unwrap());
    balancer.backend("b2").unwrap().add_conn();

    let (watcher, rx) = SnapshotWatcher::new(&path, 20).await.unwrap();
    tokio::spawn(process_snapshot_changes(rx, Arc::clone(&balancer)));

    fs::write(&path, UPDATED).unwrap();
    watcher.trigger_reload().await.unwrap();

    let probe = Arc::clone(&balancer);
    wait_for(move || probe.backend("b4").is_some()).await;

    assert!(balancer.backend("b1").is_none());
    assert_eq!(balancer.backend("b2").unwrap().conn_num(), 1);
    assert_eq!(balancer.len(), 2);
}

#[tokio::test]
async fn invalid_snapshot_keeps_prior_pool() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backends.json");
    fs::write(&path, INITIAL).unwrap();

    let balancer = Arc::new(Balancer::new(&load_snapshot(&path).unwrap()).unwrap());

    let (watcher, rx) = SnapshotWatcher::new(&path, 20).await.unwrap();
    tokio::spawn(process_snapshot_changes(rx, Arc::clone(&balancer)));

    // Duplicate name: rejected wholesale.
    fs::write(
        &path,
        r#"[{"name":"b1", "Addr":"a", "Port":1, "weight":1},
            {"name":"b1", "Addr":"b", "Port":2, "weight":1}]"#,
    )
    .unwrap();
    watcher.trigger_reload().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(balancer.len(), 2);
    assert!(balancer.backend("b1").is_some());
    assert!(balancer.backend("b2").is_some());
}

#[tokio::test]
async fn file_change_triggers_reload() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backends.json");
    fs::write(&path, INITIAL).unwrap();

    let balancer = Arc::new(Balancer::new(&load_snapshot(&path).unwrap()).unwrap());

    let (_watcher, rx) = SnapshotWatcher::new(&path, 20).await.unwrap();
    tokio::spawn(process_snapshot_changes(rx, Arc::clone(&balancer)));

    fs::write(&path, UPDATED).unwrap();

    let probe = Arc::clone(&balancer);
    wait_for(move || probe.backend("b4").is_some()).await;
    assert!(balancer.backend("b1").is_none());
}
