//! Daemon configuration wired to a live scheduler.

use std::time::Duration;

use watchlog_compaction::{Lifecycle, LifecycleState};
use watchlog_server::config::ServerConfig;
use watchlog_server::daemon;
use watchlog_test::{hours, Harness};

const CONFIG: &str = r#"
log_level = "debug"

[store]
keyspace = "history_test"

[compaction]
worker_pool_size = 2
sweep_cooldown_seconds = 10
age_limit_hours = 24
shutdown_grace_seconds = 5

[compaction.retry]
initial_delay_ms = 100
max_delay_ms = 400
"#;

#[tokio::test(start_paused = true)]
async fn test_config_file_drives_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("watchlogd.toml");
    std::fs::write(&path, CONFIG).unwrap();

    let config = ServerConfig::from_file(&path).unwrap();
    config.validate().unwrap();
    assert!(config.store.is_memory());
    assert_eq!(config.compaction.retry.max_delay_ms, 400);

    let h = Harness::new();
    h.stage("p1", "a", hours(30), 120);
    h.stage("p1", "b", hours(12), 45);

    let scheduler = daemon::build_scheduler(&config, h.adapter(), h.shared_clock()).unwrap();
    assert_eq!(scheduler.state(), LifecycleState::Initialized);
    assert_eq!(scheduler.options().worker_pool_size, 2);
    assert_eq!(scheduler.options().sweep_interval, Duration::from_secs(10));

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.store.canonical_len(), 0);

    tokio::time::sleep(Duration::from_secs(6)).await;
    scheduler.stop().await.unwrap();

    assert_eq!(h.store.canonical_len(), 1);
    let staged = h.store.staging_rows();
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].play_id.as_str(), "b");
}

#[test]
fn test_saved_config_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("watchlogd.toml");

    let mut config = ServerConfig::new();
    config.compaction = config.compaction.with_worker_pool_size(3);
    config.save(&path).unwrap();

    let loaded = ServerConfig::from_file(&path).unwrap();
    assert_eq!(loaded.compaction, config.compaction);
    assert_eq!(loaded.store, config.store);
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("watchlogd.toml");
    std::fs::write(&path, "[compaction]\nsweep_cooldown_seconds = 1\n").unwrap();

    let config = ServerConfig::from_file(&path).unwrap();
    assert!(config.validate().is_err());
    let h = Harness::new();
    assert!(daemon::build_scheduler(&config, h.adapter(), h.shared_clock()).is_err());
}
