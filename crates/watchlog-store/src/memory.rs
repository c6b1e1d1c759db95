//! In-memory store for testing.
//!
//! `MemoryStore` models the three watch-history tables with the semantics the
//! compaction core relies on: token-ordered partition enumeration,
//! last-write-wins staging cells with timestamped tombstones, and logged
//! batches applied all-or-nothing. It can also simulate store faults and
//! latency per operation.
//!
//! Staging tombstones are kept for a grace period and then purged, like
//! `gc_grace_seconds` on a CQL table. A write stamped older than a purged
//! tombstone is accepted again.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use watchlog_common::clock::{SharedClock, SystemClock};
use watchlog_common::types::{
    Cursor, PartitionToken, PlayId, PlayKey, PlayRecord, ProfileId, Timestamp, WatchedAt,
};

use crate::adapter::{StagingRow, StoreAdapter, StoreFuture};
use crate::batch::{Batch, Consistency, Statement};
use crate::error::{StoreError, StoreResult};
use crate::token::partition_token;

/// How long a staging tombstone outlives its delete (ten days).
pub const DEFAULT_TOMBSTONE_GRACE: Duration = Duration::from_secs(10 * 24 * 3_600);

/// Adapter operations that can be faulted or slowed down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `next_partition_token`.
    NextToken,
    /// `scan_partition`.
    ScanPartition,
    /// `read_canonical`.
    ReadCanonical,
    /// `execute_batch`.
    ExecuteBatch,
    /// `ping`.
    Ping,
}

/// A canonical row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalRow {
    /// Current position.
    pub watched_at: WatchedAt,
    /// Current duration in seconds.
    pub duration_secs: u32,
}

/// An index row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    /// Clustering key.
    pub watched_at: WatchedAt,
    /// Play the entry points at.
    pub play_id: PlayId,
    /// Duration in seconds.
    pub duration_secs: u32,
}

#[derive(Debug, Clone)]
struct StagingCell {
    record: PlayRecord,
    write_ts: Timestamp,
}

#[derive(Debug, Default)]
struct Tables {
    /// Staging cells grouped by partition token.
    staging: BTreeMap<PartitionToken, BTreeMap<PlayKey, StagingCell>>,
    /// Highest tombstone timestamp per staging key.
    tombstones: HashMap<PlayKey, Timestamp>,
    canonical: BTreeMap<PlayKey, CanonicalRow>,
    /// Index partitions clustered by `watched_at` descending.
    index: BTreeMap<ProfileId, BTreeMap<Reverse<WatchedAt>, IndexRow>>,
    /// Earliest time the next tombstone purge may run.
    next_purge: Timestamp,
}

impl Tables {
    fn write_staging(&mut self, record: PlayRecord, write_ts: Timestamp) -> bool {
        let key = record.key();
        if let Some(tombstone) = self.tombstones.get(&key) {
            if *tombstone >= write_ts {
                return false;
            }
        }

        let partition = self
            .staging
            .entry(partition_token(&record.profile_id))
            .or_default();
        match partition.get(&key) {
            Some(existing) if existing.write_ts > write_ts => false,
            _ => {
                partition.insert(key, StagingCell { record, write_ts });
                true
            }
        }
    }

    fn delete_staging(&mut self, key: PlayKey, ts: Timestamp) {
        let token = partition_token(&key.profile_id);
        if let Some(partition) = self.staging.get_mut(&token) {
            if partition.get(&key).is_some_and(|cell| cell.write_ts <= ts) {
                partition.remove(&key);
            }
            if partition.is_empty() {
                self.staging.remove(&token);
            }
        }

        let tombstone = self.tombstones.entry(key).or_insert(ts);
        if *tombstone < ts {
            *tombstone = ts;
        }
    }

    /// Drops tombstones older than `horizon`. Returns how many were dropped.
    fn purge_tombstones(&mut self, horizon: Timestamp) -> usize {
        let before = self.tombstones.len();
        self.tombstones.retain(|_, ts| *ts >= horizon);
        before - self.tombstones.len()
    }

    fn apply(&mut self, statement: Statement) {
        match statement {
            Statement::UpdateCanonical {
                key,
                watched_at,
                duration_secs,
            } => {
                self.canonical.insert(
                    key,
                    CanonicalRow {
                        watched_at,
                        duration_secs,
                    },
                );
            }
            Statement::InsertIndex {
                key,
                watched_at,
                duration_secs,
            } => {
                self.index.entry(key.profile_id).or_default().insert(
                    Reverse(watched_at),
                    IndexRow {
                        watched_at,
                        play_id: key.play_id,
                        duration_secs,
                    },
                );
            }
            Statement::DeleteIndex {
                profile_id,
                watched_at,
            } => {
                if let Some(rows) = self.index.get_mut(&profile_id) {
                    rows.remove(&Reverse(watched_at));
                    if rows.is_empty() {
                        self.index.remove(&profile_id);
                    }
                }
            }
            Statement::DeleteStaging {
                profile_id,
                play_id,
                timestamp,
            } => self.delete_staging(PlayKey::new(profile_id, play_id), timestamp),
        }
    }
}

/// Operation counters for a [`MemoryStore`].
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Partition token lookups.
    pub token_lookups: AtomicU64,
    /// Partition scans.
    pub partition_scans: AtomicU64,
    /// Canonical reads.
    pub canonical_reads: AtomicU64,
    /// Batches applied.
    pub batches_applied: AtomicU64,
    /// Statements applied across all batches.
    pub statements_applied: AtomicU64,
    /// Requests failed by fault injection.
    pub injected_failures: AtomicU64,
}

impl StoreStats {
    /// Returns the number of token lookups.
    pub fn total_token_lookups(&self) -> u64 {
        self.token_lookups.load(Ordering::Relaxed)
    }

    /// Returns the number of partition scans.
    pub fn total_partition_scans(&self) -> u64 {
        self.partition_scans.load(Ordering::Relaxed)
    }

    /// Returns the number of canonical reads.
    pub fn total_canonical_reads(&self) -> u64 {
        self.canonical_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of applied batches.
    pub fn total_batches_applied(&self) -> u64 {
        self.batches_applied.load(Ordering::Relaxed)
    }

    /// Returns the number of applied statements.
    pub fn total_statements_applied(&self) -> u64 {
        self.statements_applied.load(Ordering::Relaxed)
    }

    /// Returns the number of injected failures.
    pub fn total_injected_failures(&self) -> u64 {
        self.injected_failures.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct FaultInjector {
    /// Remaining forced failures per operation.
    failures: HashMap<StoreOp, u32>,
    latency: HashMap<StoreOp, Duration>,
}

/// In-memory watch-history store.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    faults: Mutex<FaultInjector>,
    clock: SharedClock,
    tombstone_grace: Duration,
    stats: StoreStats,
    closed: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store stamping writes with the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock::shared())
    }

    /// Creates an empty store stamping writes with `clock`.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            faults: Mutex::new(FaultInjector::default()),
            clock,
            tombstone_grace: DEFAULT_TOMBSTONE_GRACE,
            stats: StoreStats::default(),
            closed: AtomicBool::new(false),
        }
    }

    /// Sets how long staging tombstones are kept.
    #[must_use]
    pub fn with_tombstone_grace(mut self, grace: Duration) -> Self {
        self.tombstone_grace = grace;
        self
    }

    /// Creates a new store wrapped in Arc.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Writes a staging row at the current clock time.
    ///
    /// Returns false if the write is shadowed by a newer tombstone or cell.
    pub fn insert_staging(&self, record: PlayRecord) -> bool {
        self.insert_staging_at(record, self.clock.now())
    }

    /// Writes a staging row with an explicit write timestamp.
    pub fn insert_staging_at(&self, record: PlayRecord, write_ts: Timestamp) -> bool {
        self.tables.write().write_staging(record, write_ts)
    }

    /// Writes a canonical row directly.
    pub fn insert_canonical(&self, key: PlayKey, watched_at: WatchedAt, duration_secs: u32) {
        self.tables.write().apply(Statement::UpdateCanonical {
            key,
            watched_at,
            duration_secs,
        });
    }

    /// Writes an index row directly.
    pub fn insert_index(&self, key: PlayKey, watched_at: WatchedAt, duration_secs: u32) {
        self.tables.write().apply(Statement::InsertIndex {
            key,
            watched_at,
            duration_secs,
        });
    }

    /// Returns all live staging rows, ordered by token then key.
    pub fn staging_rows(&self) -> Vec<PlayRecord> {
        self.tables
            .read()
            .staging
            .values()
            .flat_map(|partition| partition.values().map(|cell| cell.record.clone()))
            .collect()
    }

    /// Returns the number of live staging rows.
    pub fn staging_len(&self) -> usize {
        self.tables.read().staging.values().map(BTreeMap::len).sum()
    }

    /// Returns the canonical row for a key.
    pub fn canonical(&self, key: &PlayKey) -> Option<CanonicalRow> {
        self.tables.read().canonical.get(key).copied()
    }

    /// Returns the number of canonical rows.
    pub fn canonical_len(&self) -> usize {
        self.tables.read().canonical.len()
    }

    /// Returns the index partition of a profile, newest first.
    pub fn index_rows(&self, profile_id: &ProfileId) -> Vec<IndexRow> {
        self.tables
            .read()
            .index
            .get(profile_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of index rows across all profiles.
    pub fn index_len(&self) -> usize {
        self.tables.read().index.values().map(BTreeMap::len).sum()
    }

    /// Returns the number of staging tombstones held.
    pub fn tombstone_len(&self) -> usize {
        self.tables.read().tombstones.len()
    }

    /// Forces the next `count` calls of `op` to fail.
    pub fn fail_next(&self, op: StoreOp, count: u32) {
        self.faults.lock().failures.insert(op, count);
    }

    /// Delays every call of `op` by `latency`.
    pub fn set_latency(&self, op: StoreOp, latency: Duration) {
        self.faults.lock().latency.insert(op, latency);
    }

    /// Removes all injected faults and latency.
    pub fn clear_faults(&self) {
        let mut faults = self.faults.lock();
        faults.failures.clear();
        faults.latency.clear();
    }

    /// Returns the operation counters.
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Closes the store. Every later call fails with `StoreError::Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Returns true if the store is closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Applies latency and injected failures for one call of `op`.
    async fn enter(&self, op: StoreOp, token: Option<PartitionToken>) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }

        let (latency, fail) = {
            let mut faults = self.faults.lock();
            let latency = faults.latency.get(&op).copied();
            let fail = match faults.failures.get_mut(&op) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            };
            (latency, fail)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if fail {
            self.stats.injected_failures.fetch_add(1, Ordering::Relaxed);
            trace!(?op, "injected store failure");
            return Err(match op {
                StoreOp::ExecuteBatch => StoreError::write_failure("injected write failure"),
                StoreOp::Ping => StoreError::unavailable("injected unavailable"),
                _ => StoreError::read_failure(token, "injected read failure"),
            });
        }

        Ok(())
    }

    fn check_read_consistency(consistency: Consistency) -> StoreResult<()> {
        if consistency.is_readable() {
            Ok(())
        } else {
            Err(StoreError::invalid_query(format!(
                "consistency {consistency} is not supported for reads"
            )))
        }
    }
}

impl StoreAdapter for MemoryStore {
    fn next_partition_token(
        &self,
        after: Cursor,
        consistency: Consistency,
    ) -> StoreFuture<'_, Option<PartitionToken>> {
        Box::pin(async move {
            Self::check_read_consistency(consistency)?;
            self.enter(StoreOp::NextToken, after.token()).await?;
            self.stats.token_lookups.fetch_add(1, Ordering::Relaxed);

            let tables = self.tables.read();
            let next = match after {
                Cursor::Start => tables.staging.keys().next().copied(),
                Cursor::After(token) => tables
                    .staging
                    .range((std::ops::Bound::Excluded(token), std::ops::Bound::Unbounded))
                    .next()
                    .map(|(token, _)| *token),
            };
            Ok(next)
        })
    }

    fn scan_partition(
        &self,
        token: PartitionToken,
        consistency: Consistency,
    ) -> StoreFuture<'_, Vec<StagingRow>> {
        Box::pin(async move {
            Self::check_read_consistency(consistency)?;
            self.enter(StoreOp::ScanPartition, Some(token)).await?;
            self.stats.partition_scans.fetch_add(1, Ordering::Relaxed);

            let tables = self.tables.read();
            let rows = tables
                .staging
                .get(&token)
                .map(|partition| partition.values().map(|cell| cell.record.clone()).collect())
                .unwrap_or_default();
            Ok(rows)
        })
    }

    fn read_canonical<'a>(
        &'a self,
        token: PartitionToken,
        play_ids: &'a [PlayId],
        consistency: Consistency,
    ) -> StoreFuture<'a, HashMap<PlayKey, WatchedAt>> {
        Box::pin(async move {
            Self::check_read_consistency(consistency)?;
            self.enter(StoreOp::ReadCanonical, Some(token)).await?;
            self.stats.canonical_reads.fetch_add(1, Ordering::Relaxed);

            let tables = self.tables.read();
            let rows = tables
                .canonical
                .iter()
                .filter(|(key, _)| {
                    partition_token(&key.profile_id) == token && play_ids.contains(&key.play_id)
                })
                .map(|(key, row)| (key.clone(), row.watched_at))
                .collect();
            Ok(rows)
        })
    }

    fn execute_batch(&self, batch: Batch) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.enter(StoreOp::ExecuteBatch, None).await?;

            let count = batch.len() as u64;
            let consistency = batch.consistency();
            let now = self.clock.now();
            let purged = {
                let mut tables = self.tables.write();
                for statement in batch.into_statements() {
                    tables.apply(statement);
                }
                // At most one purge per grace period.
                if now >= tables.next_purge {
                    tables.next_purge = now.add(self.tombstone_grace);
                    tables.purge_tombstones(now.sub(self.tombstone_grace))
                } else {
                    0
                }
            };
            if purged > 0 {
                debug!(purged, "purged staging tombstones");
            }

            self.stats.batches_applied.fetch_add(1, Ordering::Relaxed);
            self.stats
                .statements_applied
                .fetch_add(count, Ordering::Relaxed);
            debug!(statements = count, %consistency, "applied batch");
            Ok(())
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.enter(StoreOp::Ping, None).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlog_common::clock::{Clock, ManualClock};

    fn record(profile: &str, play: &str, secs: u64, seq: u64, duration: u32) -> PlayRecord {
        PlayRecord::new(
            ProfileId::new(profile),
            PlayId::new(play),
            WatchedAt::from_parts(Timestamp::from_secs(secs), seq),
            duration,
        )
    }

    #[tokio::test]
    async fn test_partition_enumeration_is_token_ordered() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store.insert_staging(record(&format!("p{i}"), "a", 100, i, 1));
        }

        let mut cursor = Cursor::Start;
        let mut seen = Vec::new();
        while let Some(token) = store
            .next_partition_token(cursor, Consistency::One)
            .await
            .unwrap()
        {
            assert!(cursor.is_before(token));
            seen.push(token);
            cursor = Cursor::After(token);
        }

        assert_eq!(seen.len(), 10);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_empty_store_is_exhausted() {
        let store = MemoryStore::new();
        let next = store
            .next_partition_token(Cursor::Start, Consistency::One)
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_scan_partition() {
        let store = MemoryStore::new();
        store.insert_staging(record("p1", "a", 100, 1, 10));
        store.insert_staging(record("p1", "b", 100, 2, 20));
        store.insert_staging(record("p2", "a", 100, 3, 30));

        let token = partition_token(&ProfileId::new("p1"));
        let rows = store.scan_partition(token, Consistency::One).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.profile_id.as_str() == "p1"));
    }

    #[tokio::test]
    async fn test_read_canonical_filters_by_play() {
        let store = MemoryStore::new();
        let at = WatchedAt::from_parts(Timestamp::from_secs(50), 0);
        let key_a = PlayKey::new(ProfileId::new("p1"), PlayId::new("a"));
        let key_b = PlayKey::new(ProfileId::new("p1"), PlayId::new("b"));
        store.insert_canonical(key_a.clone(), at, 5);
        store.insert_canonical(key_b, at, 5);

        let token = partition_token(&ProfileId::new("p1"));
        let ids = [PlayId::new("a"), PlayId::new("z")];
        let rows = store
            .read_canonical(token, &ids, Consistency::One)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.get(&key_a), Some(&at));
    }

    #[tokio::test]
    async fn test_reads_reject_any_consistency() {
        let store = MemoryStore::new();
        let err = store
            .next_partition_token(Cursor::Start, Consistency::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery { .. }));
    }

    #[tokio::test]
    async fn test_staging_delete_is_last_write_wins() {
        let clock = ManualClock::shared(Timestamp::from_secs(1_000));
        let store = MemoryStore::with_clock(clock.clone());
        let rec = record("p1", "a", 100, 1, 10);
        assert!(store.insert_staging(rec.clone()));

        let mut batch = Batch::logged();
        batch.push(Statement::DeleteStaging {
            profile_id: rec.profile_id.clone(),
            play_id: rec.play_id.clone(),
            timestamp: Timestamp::from_secs(1_000),
        });
        store.execute_batch(batch).await.unwrap();
        assert_eq!(store.staging_len(), 0);

        // A write at or below the tombstone stays deleted.
        assert!(!store.insert_staging_at(rec.clone(), Timestamp::from_secs(999)));

        // A later tick survives the tombstone.
        clock.advance(Duration::from_secs(1));
        assert!(store.insert_staging(record("p1", "a", 200, 2, 20)));
        assert_eq!(store.staging_len(), 1);
    }

    #[tokio::test]
    async fn test_tombstones_purged_after_grace() {
        let clock = ManualClock::shared(Timestamp::from_secs(1_000_000));
        let store = MemoryStore::with_clock(clock.clone())
            .with_tombstone_grace(Duration::from_secs(3_600));
        let key = PlayKey::new(ProfileId::new("p1"), PlayId::new("a"));

        let mut batch = Batch::logged();
        batch.push(Statement::DeleteStaging {
            profile_id: key.profile_id.clone(),
            play_id: key.play_id.clone(),
            timestamp: clock.now(),
        });
        store.execute_batch(batch).await.unwrap();
        assert_eq!(store.tombstone_len(), 1);

        let index_only = || {
            let mut batch = Batch::logged();
            batch.push(Statement::InsertIndex {
                key: key.clone(),
                watched_at: WatchedAt::from_parts(Timestamp::from_secs(10), 0),
                duration_secs: 1,
            });
            batch
        };

        // Still inside the grace period.
        clock.advance(Duration::from_secs(1_800));
        store.execute_batch(index_only()).await.unwrap();
        assert_eq!(store.tombstone_len(), 1);

        clock.advance(Duration::from_secs(3_600));
        store.execute_batch(index_only()).await.unwrap();
        assert_eq!(store.tombstone_len(), 0);
    }

    #[tokio::test]
    async fn test_delete_does_not_remove_newer_cell() {
        let store = MemoryStore::new();
        let rec = record("p1", "a", 100, 1, 10);
        store.insert_staging_at(rec.clone(), Timestamp::from_secs(2_000));

        let mut batch = Batch::logged();
        batch.push(Statement::DeleteStaging {
            profile_id: rec.profile_id.clone(),
            play_id: rec.play_id.clone(),
            timestamp: Timestamp::from_secs(1_000),
        });
        store.execute_batch(batch).await.unwrap();
        assert_eq!(store.staging_len(), 1);
    }

    #[tokio::test]
    async fn test_index_rows_newest_first() {
        let store = MemoryStore::new();
        let key = PlayKey::new(ProfileId::new("p1"), PlayId::new("a"));
        let older = WatchedAt::from_parts(Timestamp::from_secs(10), 0);
        let newer = WatchedAt::from_parts(Timestamp::from_secs(20), 0);
        store.insert_index(key.clone(), older, 1);
        store.insert_index(key.clone(), newer, 2);

        let rows = store.index_rows(&key.profile_id);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].watched_at, newer);

        let mut batch = Batch::logged();
        batch.push(Statement::DeleteIndex {
            profile_id: key.profile_id.clone(),
            watched_at: older,
        });
        store.execute_batch(batch).await.unwrap();
        assert_eq!(store.index_len(), 1);
    }

    #[tokio::test]
    async fn test_fail_next() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::NextToken, 2);

        for _ in 0..2 {
            let err = store
                .next_partition_token(Cursor::Start, Consistency::One)
                .await
                .unwrap_err();
            assert!(err.is_transient());
        }
        assert!(store
            .next_partition_token(Cursor::Start, Consistency::One)
            .await
            .is_ok());
        assert_eq!(store.stats().total_injected_failures(), 2);
    }

    #[tokio::test]
    async fn test_failed_batch_applies_nothing() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::ExecuteBatch, 1);

        let mut batch = Batch::logged();
        batch.push(Statement::UpdateCanonical {
            key: PlayKey::new(ProfileId::new("p1"), PlayId::new("a")),
            watched_at: WatchedAt::from_parts(Timestamp::from_secs(10), 0),
            duration_secs: 1,
        });
        assert!(store.execute_batch(batch).await.is_err());
        assert_eq!(store.canonical_len(), 0);
        assert_eq!(store.stats().total_batches_applied(), 0);
    }

    #[tokio::test]
    async fn test_closed_store() {
        let store = MemoryStore::new();
        assert!(store.ping().await.is_ok());
        store.close();
        assert!(matches!(store.ping().await, Err(StoreError::Closed)));
    }
}
