//! Test fixtures.

use std::sync::Arc;
use std::time::Duration;

use watchlog_common::clock::{Clock, ManualClock, SharedClock};
use watchlog_common::constants::SECS_PER_HOUR;
use watchlog_common::types::{PlayId, PlayKey, PlayRecord, ProfileId, Timestamp, WatchedAt};
use watchlog_compaction::{
    CompactionResult, CursorScanner, MigrationExecutor, RetryPolicy, Scheduler, SchedulerOptions,
    SchedulerStats, Sweeper, WorkerPool,
};
use watchlog_store::{MemoryStore, StoreAdapter};

use crate::recording::RecordingStore;

/// Fixed "now" of every harness: 2023-11-14T22:13:20Z.
pub const NOW_SECS: u64 = 1_700_000_000;

/// Age limit used by the scenarios.
pub const AGE_LIMIT_HOURS: u64 = 24;

/// Returns `hours` as a duration.
pub fn hours(hours: u64) -> Duration {
    Duration::from_secs(hours * SECS_PER_HOUR)
}

/// Scheduler options with short timers.
pub fn fast_options() -> SchedulerOptions {
    SchedulerOptions::default()
        .with_worker_pool_size(4)
        .with_sweep_interval(Duration::from_millis(100))
        .with_age_limit(hours(AGE_LIMIT_HOURS))
        .with_retry(RetryPolicy {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            max_attempts: 10,
            stuck_after_attempts: 3,
        })
        .with_shutdown_grace(Duration::from_secs(5))
}

/// A manual clock, an in-memory store and a recording wrapper around it.
#[derive(Debug, Clone)]
pub struct Harness {
    /// Shared clock; the store stamps writes with it.
    pub clock: Arc<ManualClock>,
    /// Backing store.
    pub store: Arc<MemoryStore>,
    /// Recording view of `store`.
    pub recorder: Arc<RecordingStore>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Creates a harness at [`NOW_SECS`].
    pub fn new() -> Self {
        let clock = ManualClock::shared(Timestamp::from_secs(NOW_SECS));
        let shared: SharedClock = clock.clone();
        let store = Arc::new(MemoryStore::with_clock(shared));
        let recorder = Arc::new(RecordingStore::new(Arc::clone(&store)));
        Self {
            clock,
            store,
            recorder,
        }
    }

    /// Returns the clock as a trait object.
    pub fn shared_clock(&self) -> SharedClock {
        self.clock.clone()
    }

    /// Returns the recording store as a trait object.
    pub fn adapter(&self) -> Arc<dyn StoreAdapter> {
        self.recorder.clone()
    }

    /// Returns the current clock time.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Returns a `WatchedAt` `age` before now.
    pub fn ago(&self, age: Duration) -> WatchedAt {
        WatchedAt::from_parts(self.now().sub(age), 0)
    }

    /// Builds a record watched `age` before now.
    pub fn tick(&self, profile: &str, play: &str, age: Duration, duration_secs: u32) -> PlayRecord {
        PlayRecord::new(
            ProfileId::new(profile),
            PlayId::new(play),
            self.ago(age),
            duration_secs,
        )
    }

    /// Writes a record watched `age` before now into staging.
    pub fn stage(&self, profile: &str, play: &str, age: Duration, duration_secs: u32) -> PlayRecord {
        let record = self.tick(profile, play, age, duration_secs);
        self.store.insert_staging(record.clone());
        record
    }

    /// Builds a sweeper over the recording store.
    pub fn sweeper(&self, options: &SchedulerOptions) -> CompactionResult<Sweeper> {
        Ok(Sweeper::new(
            CursorScanner::new(self.adapter()),
            MigrationExecutor::new(self.adapter(), self.shared_clock()),
            Arc::new(WorkerPool::new(options.worker_pool_size)?),
            self.shared_clock(),
            options.age_limit,
            options.retry,
            Arc::new(SchedulerStats::new()),
        ))
    }

    /// Builds a scheduler over the recording store.
    pub fn scheduler(&self, options: SchedulerOptions) -> Scheduler {
        Scheduler::new(self.adapter(), self.shared_clock(), options)
    }
}

/// Returns the key of `profile`/`play`.
pub fn key(profile: &str, play: &str) -> PlayKey {
    PlayKey::new(ProfileId::new(profile), PlayId::new(play))
}
