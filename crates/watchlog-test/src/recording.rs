//! Instrumented store wrapper.
//!
//! [`RecordingStore`] forwards to a [`MemoryStore`] and records what the
//! compaction core does with it: the order of partition lookups, how many
//! scans and batches ran at the same time, and when sweeps started and
//! finished. It can also return extra rows from a partition scan to simulate
//! a replica still holding superseded ticks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use watchlog_common::types::{Cursor, PartitionToken, PlayId, PlayKey, PlayRecord, WatchedAt};
use watchlog_store::{
    partition_token, Batch, Consistency, MemoryStore, StagingRow, StoreAdapter, StoreFuture,
};

/// Observed store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Lookup from the first partition.
    SweepStarted,
    /// Lookup resolved a partition.
    PartitionResolved(PartitionToken),
    /// Lookup found no further partition.
    SweepExhausted,
    /// A batch began executing.
    BatchStarted,
    /// A batch finished executing.
    BatchFinished,
}

/// Tracks current and peak concurrency.
#[derive(Debug, Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    /// Enters the gauged section.
    pub fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self)
    }

    /// Returns the highest concurrency seen.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Returns the current concurrency.
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

/// Leaves the gauged section on drop.
#[derive(Debug)]
pub struct GaugeGuard<'a>(&'a Gauge);

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store wrapper recording every call.
#[derive(Debug)]
pub struct RecordingStore {
    inner: Arc<MemoryStore>,
    events: Mutex<Vec<StoreEvent>>,
    stale_rows: Mutex<HashMap<PartitionToken, Vec<PlayRecord>>>,
    scans: Gauge,
    batches: Gauge,
}

impl RecordingStore {
    /// Wraps `inner`.
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            events: Mutex::new(Vec::new()),
            stale_rows: Mutex::new(HashMap::new()),
            scans: Gauge::default(),
            batches: Gauge::default(),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &Arc<MemoryStore> {
        &self.inner
    }

    /// Returns every recorded event in order.
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().clone()
    }

    /// Returns the scan concurrency gauge.
    pub fn scans(&self) -> &Gauge {
        &self.scans
    }

    /// Returns the batch concurrency gauge.
    pub fn batches(&self) -> &Gauge {
        &self.batches
    }

    /// Returns `record` once from the next scan of its partition, in
    /// addition to the stored rows.
    pub fn add_stale_row(&self, record: PlayRecord) {
        self.stale_rows
            .lock()
            .entry(partition_token(&record.profile_id))
            .or_default()
            .push(record);
    }

    fn record(&self, event: StoreEvent) {
        self.events.lock().push(event);
    }
}

impl StoreAdapter for RecordingStore {
    fn next_partition_token(
        &self,
        after: Cursor,
        consistency: Consistency,
    ) -> StoreFuture<'_, Option<PartitionToken>> {
        Box::pin(async move {
            if after.is_start() {
                self.record(StoreEvent::SweepStarted);
            }
            let next = {
                let _scan = self.scans.enter();
                self.inner.next_partition_token(after, consistency).await?
            };
            self.record(match next {
                Some(token) => StoreEvent::PartitionResolved(token),
                None => StoreEvent::SweepExhausted,
            });
            Ok(next)
        })
    }

    fn scan_partition(
        &self,
        token: PartitionToken,
        consistency: Consistency,
    ) -> StoreFuture<'_, Vec<StagingRow>> {
        Box::pin(async move {
            let mut rows = {
                let _scan = self.scans.enter();
                self.inner.scan_partition(token, consistency).await?
            };
            if let Some(stale) = self.stale_rows.lock().remove(&token) {
                rows.extend(stale);
            }
            Ok(rows)
        })
    }

    fn read_canonical<'a>(
        &'a self,
        token: PartitionToken,
        play_ids: &'a [PlayId],
        consistency: Consistency,
    ) -> StoreFuture<'a, HashMap<PlayKey, WatchedAt>> {
        self.inner.read_canonical(token, play_ids, consistency)
    }

    fn execute_batch(&self, batch: Batch) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.record(StoreEvent::BatchStarted);
            let result = {
                let _batch = self.batches.enter();
                self.inner.execute_batch(batch).await
            };
            self.record(StoreEvent::BatchFinished);
            result
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        self.inner.ping()
    }
}
