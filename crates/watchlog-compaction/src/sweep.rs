//! One pass of the cursor over the token ring.
//!
//! A sweep scans partitions strictly in token order. Each partition with
//! eligible rows is handed to the worker pool as one migration task; the
//! sweep ends once every submitted task has finished.
//!
//! Scan failures never advance the cursor. They are retried with bounded
//! exponential back-off; a long streak flags the sweep as stuck, and a
//! longer one abandons it so the next tick restarts from the first partition.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use watchlog_common::clock::SharedClock;
use watchlog_common::types::{Cursor, PartitionToken, PlayRecord, Timestamp};
use watchlog_store::StoreError;

use crate::backoff::{Backoff, BackoffStep, RetryPolicy};
use crate::migration::{play_ids, MigrationExecutor};
use crate::pool::{TaskGroup, WorkerPool};
use crate::scanner::{CursorScanner, ScanOutcome};
use crate::stats::SchedulerStats;

/// How a sweep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepEnd {
    /// Every partition was visited.
    Exhausted,
    /// Shutdown was requested.
    Cancelled,
    /// Too many consecutive scan failures.
    Abandoned {
        /// Length of the failure streak.
        attempts: u32,
    },
}

/// Summary of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// How the sweep ended.
    pub end: SweepEnd,
    /// Age cutoff the sweep used.
    pub age_cutoff: Timestamp,
    /// Partitions resolved.
    pub partitions_scanned: usize,
    /// Partitions handed to the pool.
    pub partitions_submitted: usize,
    /// Eligible rows handed to the pool.
    pub records_submitted: usize,
    /// Scan retries.
    pub retries: usize,
    /// Migration tasks that panicked.
    pub panicked: usize,
    /// Wall time of the sweep.
    pub elapsed: Duration,
}

/// State threaded through one sweep.
#[derive(Debug)]
pub struct SweepState {
    cursor: Cursor,
    age_cutoff: Timestamp,
    backoff: Backoff,
    partitions_scanned: usize,
    partitions_submitted: usize,
    records_submitted: usize,
    retries: usize,
}

impl SweepState {
    /// Creates the state of a sweep starting at the first partition.
    pub fn new(age_cutoff: Timestamp, retry: RetryPolicy) -> Self {
        Self {
            cursor: Cursor::Start,
            age_cutoff,
            backoff: Backoff::new(retry),
            partitions_scanned: 0,
            partitions_submitted: 0,
            records_submitted: 0,
            retries: 0,
        }
    }

    /// Returns the current cursor.
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Returns the age cutoff.
    pub fn age_cutoff(&self) -> Timestamp {
        self.age_cutoff
    }

    fn advance_to(&mut self, token: PartitionToken) {
        debug_assert!(self.cursor.is_before(token));
        self.cursor = Cursor::After(token);
        self.partitions_scanned += 1;
        self.backoff.reset();
    }

    fn into_report(self, end: SweepEnd, panicked: usize, elapsed: Duration) -> SweepReport {
        SweepReport {
            end,
            age_cutoff: self.age_cutoff,
            partitions_scanned: self.partitions_scanned,
            partitions_submitted: self.partitions_submitted,
            records_submitted: self.records_submitted,
            retries: self.retries,
            panicked,
            elapsed,
        }
    }
}

/// Runs sweeps.
#[derive(Debug, Clone)]
pub struct Sweeper {
    scanner: CursorScanner,
    executor: MigrationExecutor,
    pool: Arc<WorkerPool>,
    clock: SharedClock,
    age_limit: Duration,
    retry: RetryPolicy,
    stats: Arc<SchedulerStats>,
}

enum Step {
    Scanned(Result<ScanOutcome, StoreError>),
    Submitted(Result<(), crate::error::CompactionError>),
    Slept,
    Cancelled,
}

impl Sweeper {
    /// Creates a sweeper.
    pub fn new(
        scanner: CursorScanner,
        executor: MigrationExecutor,
        pool: Arc<WorkerPool>,
        clock: SharedClock,
        age_limit: Duration,
        retry: RetryPolicy,
        stats: Arc<SchedulerStats>,
    ) -> Self {
        Self {
            scanner,
            executor,
            pool,
            clock,
            age_limit,
            retry,
            stats,
        }
    }

    /// Returns the statistics the sweeper updates.
    pub fn stats(&self) -> &Arc<SchedulerStats> {
        &self.stats
    }

    /// Runs one full sweep.
    ///
    /// Cancellation stops the scan; tasks already submitted still run to
    /// completion before this returns.
    pub async fn run(&self, cancel: &CancellationToken) -> SweepReport {
        let started = Instant::now();
        let cutoff = self.clock.now().sub(self.age_limit);
        let mut state = SweepState::new(cutoff, self.retry);
        let mut group = TaskGroup::new();

        self.stats.sweeps_started.fetch_add(1, Ordering::Relaxed);
        debug!(%cutoff, "sweep started");

        let end = loop {
            if cancel.is_cancelled() {
                break SweepEnd::Cancelled;
            }

            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                result = self.scanner.advance(state.cursor, state.age_cutoff) => Step::Scanned(result),
            };

            let outcome = match step {
                Step::Scanned(Ok(outcome)) => outcome,
                Step::Scanned(Err(e)) => match self.on_scan_failure(&mut state, &e, cancel).await {
                    Some(end) => break end,
                    None => continue,
                },
                _ => break SweepEnd::Cancelled,
            };

            let (token, records) = match outcome {
                ScanOutcome::Exhausted => break SweepEnd::Exhausted,
                ScanOutcome::Partition { token, records, .. } => (token, records),
            };

            state.advance_to(token);
            self.stats.partitions_scanned.fetch_add(1, Ordering::Relaxed);
            if self.stats.stuck.load(Ordering::Relaxed) {
                info!(%token, "scan recovered");
                self.stats.set_stuck(false);
            }
            if records.is_empty() {
                continue;
            }

            let count = records.len();
            let task = self.migration_task(token, records);
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                result = self.pool.submit(&mut group, task) => Step::Submitted(result),
            };
            match step {
                Step::Submitted(Ok(())) => {
                    state.partitions_submitted += 1;
                    state.records_submitted += count;
                    self.stats
                        .partitions_submitted
                        .fetch_add(1, Ordering::Relaxed);
                }
                Step::Submitted(Err(e)) => {
                    warn!(%token, error = %e, "pool rejected migration task");
                    break SweepEnd::Cancelled;
                }
                _ => break SweepEnd::Cancelled,
            }
        };

        let panicked = group.wait().await;
        let report = state.into_report(end, panicked, started.elapsed());
        self.finish(&report);
        report
    }

    /// Backs off after a scan failure. Returns the sweep end if the sweep
    /// must stop.
    async fn on_scan_failure(
        &self,
        state: &mut SweepState,
        err: &StoreError,
        cancel: &CancellationToken,
    ) -> Option<SweepEnd> {
        state.retries += 1;
        self.stats.scan_retries.fetch_add(1, Ordering::Relaxed);

        match state.backoff.on_failure() {
            BackoffStep::Retry {
                delay,
                attempt,
                stuck,
            } => {
                if stuck {
                    self.stats.set_stuck(true);
                    error!(
                        cursor = %state.cursor,
                        attempt,
                        error = %err,
                        "sweep is stuck on scan failures, retrying in {:?}",
                        delay
                    );
                } else {
                    warn!(
                        cursor = %state.cursor,
                        attempt,
                        error = %err,
                        "scan failed, retrying in {:?}",
                        delay
                    );
                }

                let step = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Step::Cancelled,
                    _ = tokio::time::sleep(delay) => Step::Slept,
                };
                match step {
                    Step::Slept => None,
                    _ => Some(SweepEnd::Cancelled),
                }
            }
            BackoffStep::GiveUp { attempts } => {
                error!(
                    cursor = %state.cursor,
                    attempts,
                    error = %err,
                    "abandoning sweep after repeated scan failures"
                );
                Some(SweepEnd::Abandoned { attempts })
            }
        }
    }

    fn migration_task(
        &self,
        token: PartitionToken,
        records: Vec<PlayRecord>,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        let executor = self.executor.clone();
        let stats = Arc::clone(&self.stats);
        async move {
            let plays = play_ids(&records);
            match executor.migrate(token, records).await {
                Ok(outcome) => stats.record_migration(outcome.migrated),
                Err(e) => {
                    stats.record_batch_failure();
                    warn!(%token, ?plays, error = %e, "failed to migrate partition");
                }
            }
        }
    }

    fn finish(&self, report: &SweepReport) {
        let counter = match report.end {
            SweepEnd::Exhausted => {
                self.stats.set_stuck(false);
                &self.stats.sweeps_completed
            }
            SweepEnd::Cancelled => &self.stats.sweeps_cancelled,
            SweepEnd::Abandoned { .. } => &self.stats.sweeps_abandoned,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        info!(
            end = ?report.end,
            partitions = report.partitions_scanned,
            submitted = report.partitions_submitted,
            records = report.records_submitted,
            retries = report.retries,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "sweep finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlog_common::clock::ManualClock;
    use watchlog_common::types::{PlayId, ProfileId, WatchedAt};
    use watchlog_store::{MemoryStore, StoreOp};

    const NOW_SECS: u64 = 1_700_000_000;
    const HOUR: u64 = 3_600;

    fn record(profile: &str, play: &str, secs: u64, duration: u32) -> PlayRecord {
        PlayRecord::new(
            ProfileId::new(profile),
            PlayId::new(play),
            WatchedAt::from_parts(Timestamp::from_secs(secs), 0),
            duration,
        )
    }

    fn sweeper(store: Arc<MemoryStore>, clock: SharedClock, pool_size: usize) -> Sweeper {
        let retry = RetryPolicy {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            max_attempts: 6,
            stuck_after_attempts: 3,
        };
        Sweeper::new(
            CursorScanner::new(store.clone()),
            MigrationExecutor::new(store, clock.clone()),
            Arc::new(WorkerPool::new(pool_size).unwrap()),
            clock,
            Duration::from_secs(24 * HOUR),
            retry,
            Arc::new(SchedulerStats::new()),
        )
    }

    fn setup() -> (Arc<MemoryStore>, SharedClock) {
        let clock: SharedClock = ManualClock::shared(Timestamp::from_secs(NOW_SECS));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        (store, clock)
    }

    #[tokio::test]
    async fn test_sweep_migrates_old_rows_only() {
        let (store, clock) = setup();
        store.insert_staging(record("p1", "a", NOW_SECS - 30 * HOUR, 120));
        store.insert_staging(record("p2", "b", NOW_SECS - HOUR, 10));
        store.insert_staging(record("p3", "c", NOW_SECS - 48 * HOUR, 30));

        let sweeper = sweeper(store.clone(), clock, 2);
        let report = sweeper.run(&CancellationToken::new()).await;

        assert_eq!(report.end, SweepEnd::Exhausted);
        assert_eq!(report.partitions_scanned, 3);
        assert_eq!(report.partitions_submitted, 2);
        assert_eq!(store.staging_len(), 1);
        assert_eq!(store.canonical_len(), 2);
        assert_eq!(store.staging_rows()[0].play_id.as_str(), "b");
        assert_eq!(sweeper.stats.snapshot().records_migrated, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_scan_failure_is_retried() {
        let (store, clock) = setup();
        store.insert_staging(record("p1", "a", NOW_SECS - 30 * HOUR, 120));
        store.fail_next(StoreOp::NextToken, 2);

        let sweeper = sweeper(store.clone(), clock, 1);
        let report = sweeper.run(&CancellationToken::new()).await;

        assert_eq!(report.end, SweepEnd::Exhausted);
        assert_eq!(report.retries, 2);
        assert_eq!(store.staging_len(), 0);
        assert!(!sweeper.stats.snapshot().stuck);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_scan_failure_abandons_sweep() {
        let (store, clock) = setup();
        store.insert_staging(record("p1", "a", NOW_SECS - 30 * HOUR, 120));
        store.fail_next(StoreOp::ScanPartition, 100);

        let sweeper = sweeper(store.clone(), clock, 1);
        let report = sweeper.run(&CancellationToken::new()).await;

        assert_eq!(report.end, SweepEnd::Abandoned { attempts: 6 });
        let snap = sweeper.stats.snapshot();
        assert!(snap.stuck);
        assert_eq!(snap.sweeps_abandoned, 1);
        assert_eq!(store.staging_len(), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_is_counted_and_sweep_completes() {
        let (store, clock) = setup();
        store.insert_staging(record("p1", "a", NOW_SECS - 30 * HOUR, 120));
        store.fail_next(StoreOp::ExecuteBatch, 1);

        let sweeper = sweeper(store.clone(), clock, 1);
        let report = sweeper.run(&CancellationToken::new()).await;

        assert_eq!(report.end, SweepEnd::Exhausted);
        assert_eq!(sweeper.stats.snapshot().batches_failed, 1);
        assert_eq!(store.staging_len(), 1);

        sweeper.run(&CancellationToken::new()).await;
        assert_eq!(store.staging_len(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (store, clock) = setup();
        store.insert_staging(record("p1", "a", NOW_SECS - 30 * HOUR, 120));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let sweeper = sweeper(store.clone(), clock, 1);
        let report = sweeper.run(&cancel).await;

        assert_eq!(report.end, SweepEnd::Cancelled);
        assert_eq!(report.partitions_scanned, 0);
        assert_eq!(store.staging_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let (store, clock) = setup();
        store.insert_staging(record("p1", "a", NOW_SECS - 30 * HOUR, 120));
        store.fail_next(StoreOp::NextToken, 100);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(15)).await;
            trigger.cancel();
        });

        let sweeper = sweeper(store.clone(), clock, 1);
        let report = sweeper.run(&cancel).await;
        assert_eq!(report.end, SweepEnd::Cancelled);
        assert!(report.retries >= 1);
    }
}
