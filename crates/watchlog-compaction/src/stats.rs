//! Scheduler statistics.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Counters shared by the sweep loop and the pool workers.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    /// Sweeps started.
    pub sweeps_started: AtomicU64,
    /// Sweeps that reached the end of the token ring.
    pub sweeps_completed: AtomicU64,
    /// Sweeps given up after too many consecutive scan failures.
    pub sweeps_abandoned: AtomicU64,
    /// Sweeps interrupted by shutdown.
    pub sweeps_cancelled: AtomicU64,
    /// Partitions resolved by the scanner.
    pub partitions_scanned: AtomicU64,
    /// Partitions handed to the pool.
    pub partitions_submitted: AtomicU64,
    /// Plays written to canonical storage.
    pub records_migrated: AtomicU64,
    /// Migration batches that failed.
    pub batches_failed: AtomicU64,
    /// Scan retries after store failures.
    pub scan_retries: AtomicU64,
    /// Set while the current sweep is stuck on scan failures.
    pub stuck: AtomicBool,
}

impl SchedulerStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a migrated partition.
    pub fn record_migration(&self, records: usize) {
        self.records_migrated
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    /// Records a failed migration batch.
    pub fn record_batch_failure(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Sets the stuck flag.
    pub fn set_stuck(&self, stuck: bool) {
        self.stuck.store(stuck, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sweeps_started: self.sweeps_started.load(Ordering::Relaxed),
            sweeps_completed: self.sweeps_completed.load(Ordering::Relaxed),
            sweeps_abandoned: self.sweeps_abandoned.load(Ordering::Relaxed),
            sweeps_cancelled: self.sweeps_cancelled.load(Ordering::Relaxed),
            partitions_scanned: self.partitions_scanned.load(Ordering::Relaxed),
            partitions_submitted: self.partitions_submitted.load(Ordering::Relaxed),
            records_migrated: self.records_migrated.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            scan_retries: self.scan_retries.load(Ordering::Relaxed),
            stuck: self.stuck.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`SchedulerStats`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct StatsSnapshot {
    pub sweeps_started: u64,
    pub sweeps_completed: u64,
    pub sweeps_abandoned: u64,
    pub sweeps_cancelled: u64,
    pub partitions_scanned: u64,
    pub partitions_submitted: u64,
    pub records_migrated: u64,
    pub batches_failed: u64,
    pub scan_retries: u64,
    pub stuck: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = SchedulerStats::new();
        stats.record_migration(3);
        stats.record_migration(2);
        stats.record_batch_failure();
        stats.set_stuck(true);

        let snap = stats.snapshot();
        assert_eq!(snap.records_migrated, 5);
        assert_eq!(snap.batches_failed, 1);
        assert!(snap.stuck);
        assert_eq!(snap.sweeps_started, 0);
    }
}
