//! Daemon wiring.
//!
//! Opens the store, checks it is reachable, runs the compaction scheduler
//! and stops it once a shutdown future resolves.

use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use watchlog_common::clock::{SharedClock, SystemClock};
use watchlog_compaction::{Lifecycle, Scheduler, SchedulerOptions};
use watchlog_store::schema;
use watchlog_store::{MemoryStore, StoreAdapter};

use crate::config::{ServerConfig, StoreConfig};

/// Opens the store selected by `config`.
///
/// Only the in-memory store is built into this binary; configuring store
/// hosts is a startup error.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn StoreAdapter>> {
    if !config.is_memory() {
        bail!(
            "store hosts {:?} configured for keyspace '{}', but this build has no CQL driver; \
             remove `store.hosts` to run against the in-memory store",
            config.hosts,
            config.keyspace
        );
    }
    info!("No store hosts configured, using in-memory store");
    Ok(MemoryStore::shared())
}

/// Returns the keyspace and table DDL for `config`.
pub fn schema_ddl(config: &StoreConfig) -> Result<Vec<String>> {
    let mut statements = vec![schema::create_keyspace(
        &config.keyspace,
        config.replication()?,
        config.replication_factor,
    )];
    statements.extend(schema::create_statements().into_iter().map(str::to_string));
    Ok(statements)
}

/// Builds an initialized scheduler.
pub fn build_scheduler(
    config: &ServerConfig,
    store: Arc<dyn StoreAdapter>,
    clock: SharedClock,
) -> Result<Scheduler> {
    let options =
        SchedulerOptions::from_config(&config.compaction).context("Invalid compaction config")?;
    let scheduler = Scheduler::new(store, clock, options);
    scheduler
        .init_pool()
        .context("Failed to initialize worker pool")?;
    Ok(scheduler)
}

/// Runs compaction against `store` until `shutdown` resolves.
pub async fn run<F>(config: ServerConfig, store: Arc<dyn StoreAdapter>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    store.ping().await.context("Store is not reachable")?;
    info!("Store is reachable");

    let scheduler = build_scheduler(&config, store, SystemClock::shared())?;

    info!("Compaction configuration:");
    info!("  Worker pool size: {}", config.compaction.worker_pool_size);
    info!("  Sweep cooldown: {}s", config.compaction.sweep_cooldown_seconds);
    info!("  Age limit: {}h", config.compaction.age_limit_hours);

    scheduler.start().context("Failed to start scheduler")?;
    info!("Press Ctrl+C to shutdown");

    shutdown.await;
    info!("Shutting down gracefully...");

    let stats = scheduler.stats().snapshot();
    let stopped = scheduler.stop().await;
    info!(
        sweeps = stats.sweeps_completed,
        migrated = stats.records_migrated,
        failed_batches = stats.batches_failed,
        "Compaction summary"
    );
    stopped.context("Scheduler did not stop cleanly")?;

    info!("Stopped. Goodbye!");
    Ok(())
}
