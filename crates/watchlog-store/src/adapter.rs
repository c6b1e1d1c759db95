//! Store adapter contract.
//!
//! The compaction core reaches the wide-column store only through
//! [`StoreAdapter`]. Implementations must be safe to share between the sweep
//! loop and every pool worker.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use watchlog_common::types::{Cursor, PartitionToken, PlayId, PlayKey, PlayRecord, WatchedAt};

use crate::batch::{Batch, Consistency};
use crate::error::StoreResult;

/// Boxed future returned by adapter methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// A row read from the staging table.
pub type StagingRow = PlayRecord;

/// Trait for watch-history store implementations.
///
/// This trait abstracts the store client, allowing different implementations
/// for production (a CQL driver) and testing (in-memory).
pub trait StoreAdapter: Send + Sync + std::fmt::Debug {
    /// Returns the first staging partition token strictly after `after`.
    ///
    /// `Cursor::Start` resolves the lowest token on the ring. Returns
    /// `Ok(None)` when no further partition exists.
    fn next_partition_token(
        &self,
        after: Cursor,
        consistency: Consistency,
    ) -> StoreFuture<'_, Option<PartitionToken>>;

    /// Returns every live staging row of the partition.
    fn scan_partition(
        &self,
        token: PartitionToken,
        consistency: Consistency,
    ) -> StoreFuture<'_, Vec<StagingRow>>;

    /// Returns the canonical `watched_at` of each listed play in the partition.
    ///
    /// Plays with no canonical row are absent from the map.
    fn read_canonical<'a>(
        &'a self,
        token: PartitionToken,
        play_ids: &'a [PlayId],
        consistency: Consistency,
    ) -> StoreFuture<'a, HashMap<PlayKey, WatchedAt>>;

    /// Applies a batch at the batch's own consistency.
    fn execute_batch(&self, batch: Batch) -> StoreFuture<'_, ()>;

    /// Checks that the store is reachable.
    fn ping(&self) -> StoreFuture<'_, ()>;
}
