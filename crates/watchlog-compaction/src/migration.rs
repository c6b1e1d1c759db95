//! Migration executor.
//!
//! Moves the eligible rows of one partition into canonical storage with a
//! single logged batch:
//!
//! ```text
//! UPDATE watched         SET watched_at, duration      (per play)
//! INSERT ordered_watch   at the new watched_at         (per play)
//! DELETE ordered_watch   at the previous watched_at    (if one existed)
//! DELETE recent_watch    USING TIMESTAMP <build time>  (per play)
//! ```
//!
//! Re-running a partition after a failure rebuilds the same batch, so a
//! partially observed attempt is completed by the next sweep.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use watchlog_common::clock::SharedClock;
use watchlog_common::types::{PartitionToken, PlayId, PlayKey, PlayRecord, Timestamp, WatchedAt};
use watchlog_store::{Batch, Consistency, Statement, StoreAdapter};

use crate::error::CompactionResult;

/// Consistency of the canonical read.
pub const CANONICAL_READ_CONSISTENCY: Consistency = Consistency::One;

/// Consistency of the migration batch.
pub const MIGRATION_WRITE_CONSISTENCY: Consistency = Consistency::Any;

/// Result of migrating one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// Migrated partition.
    pub token: PartitionToken,
    /// Plays written to canonical storage.
    pub migrated: usize,
    /// Superseded index entries deleted.
    pub stale_index_deleted: usize,
}

/// Applies partition migrations.
#[derive(Debug, Clone)]
pub struct MigrationExecutor {
    store: Arc<dyn StoreAdapter>,
    clock: SharedClock,
}

impl MigrationExecutor {
    /// Creates an executor writing to `store`.
    ///
    /// `clock` stamps the staging deletes.
    pub fn new(store: Arc<dyn StoreAdapter>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Migrates the eligible `records` of partition `token`.
    pub async fn migrate(
        &self,
        token: PartitionToken,
        records: Vec<PlayRecord>,
    ) -> CompactionResult<MigrationOutcome> {
        if records.is_empty() {
            return Ok(MigrationOutcome {
                token,
                migrated: 0,
                stale_index_deleted: 0,
            });
        }

        let play_ids = play_ids(&records);
        let previous = self
            .store
            .read_canonical(token, &play_ids, CANONICAL_READ_CONSISTENCY)
            .await?;

        let delete_ts = self.clock.now();
        let batch = build_batch(&records, &previous, delete_ts);
        let stale_index_deleted = batch
            .statements()
            .iter()
            .filter(|s| matches!(s, Statement::DeleteIndex { .. }))
            .count();

        self.store.execute_batch(batch).await?;
        debug!(%token, plays = records.len(), stale_index_deleted, "migrated partition");

        Ok(MigrationOutcome {
            token,
            migrated: records.len(),
            stale_index_deleted,
        })
    }
}

/// Returns the distinct play ids of `records`.
pub fn play_ids(records: &[PlayRecord]) -> Vec<PlayId> {
    let mut ids: Vec<PlayId> = records.iter().map(|r| r.play_id.clone()).collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Builds the migration batch for `records`.
///
/// `previous` holds the canonical `watched_at` per play before the batch.
pub fn build_batch(
    records: &[PlayRecord],
    previous: &HashMap<PlayKey, WatchedAt>,
    delete_ts: Timestamp,
) -> Batch {
    let mut batch = Batch::logged().with_consistency(MIGRATION_WRITE_CONSISTENCY);

    for record in records {
        let key = record.key();

        batch.push(Statement::UpdateCanonical {
            key: key.clone(),
            watched_at: record.watched_at,
            duration_secs: record.duration_secs,
        });
        batch.push(Statement::InsertIndex {
            key: key.clone(),
            watched_at: record.watched_at,
            duration_secs: record.duration_secs,
        });

        // Equal positions mean the tick was already migrated; deleting would
        // remove the row just inserted.
        if let Some(prev) = previous.get(&key) {
            if *prev != record.watched_at {
                batch.push(Statement::DeleteIndex {
                    profile_id: key.profile_id.clone(),
                    watched_at: *prev,
                });
            }
        }

        batch.push(Statement::DeleteStaging {
            profile_id: key.profile_id,
            play_id: key.play_id,
            timestamp: delete_ts,
        });
    }

    batch
}
