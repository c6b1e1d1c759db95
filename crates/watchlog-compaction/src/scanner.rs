//! Cursor scanner.
//!
//! Walks staging partitions in token order, one partition per call, and
//! returns the rows of that partition eligible for migration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use watchlog_common::types::{Cursor, PartitionToken, PlayKey, PlayRecord, Timestamp};
use watchlog_store::{Consistency, StoreAdapter, StoreResult};

/// Consistency used for every scanner read.
pub const SCAN_CONSISTENCY: Consistency = Consistency::One;

/// Result of advancing the cursor by one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The next partition was resolved.
    Partition {
        /// Token of the resolved partition.
        token: PartitionToken,
        /// Rows read from the partition before filtering.
        scanned: usize,
        /// Eligible, deduplicated rows ordered by key.
        records: Vec<PlayRecord>,
    },
    /// No partition exists past the cursor.
    Exhausted,
}

/// Resolves and reads staging partitions.
#[derive(Debug, Clone)]
pub struct CursorScanner {
    store: Arc<dyn StoreAdapter>,
}

impl CursorScanner {
    /// Creates a scanner over `store`.
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        Self { store }
    }

    /// Resolves the first partition strictly past `cursor` and returns its
    /// rows older than `age_cutoff`.
    ///
    /// A store failure leaves the cursor where it was; calling again with the
    /// same cursor re-reads the same partition.
    pub async fn advance(&self, cursor: Cursor, age_cutoff: Timestamp) -> StoreResult<ScanOutcome> {
        let Some(token) = self
            .store
            .next_partition_token(cursor, SCAN_CONSISTENCY)
            .await?
        else {
            trace!(%cursor, "no partition past cursor");
            return Ok(ScanOutcome::Exhausted);
        };

        let rows = self.store.scan_partition(token, SCAN_CONSISTENCY).await?;
        let scanned = rows.len();
        let records = select_eligible(rows, age_cutoff);
        trace!(%token, scanned, eligible = records.len(), "scanned partition");

        Ok(ScanOutcome::Partition {
            token,
            scanned,
            records,
        })
    }
}

/// Keeps rows strictly older than `age_cutoff` and, per play, only the one
/// with the greatest `watched_at`.
pub fn select_eligible(rows: Vec<PlayRecord>, age_cutoff: Timestamp) -> Vec<PlayRecord> {
    let mut latest: HashMap<PlayKey, PlayRecord> = HashMap::with_capacity(rows.len());
    for row in rows {
        if !row.watched_at.is_older_than(age_cutoff) {
            continue;
        }
        match latest.get(&row.key()) {
            Some(existing) if !row.supersedes(existing) => {}
            _ => {
                latest.insert(row.key(), row);
            }
        }
    }

    let mut records: Vec<PlayRecord> = latest.into_values().collect();
    records.sort_by(|a, b| {
        (&a.profile_id, &a.play_id).cmp(&(&b.profile_id, &b.play_id))
    });
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlog_common::types::{PlayId, ProfileId, WatchedAt};
    use watchlog_store::{partition_token, MemoryStore, StoreOp};

    fn record(profile: &str, play: &str, secs: u64, duration: u32) -> PlayRecord {
        PlayRecord::new(
            ProfileId::new(profile),
            PlayId::new(play),
            WatchedAt::from_parts(Timestamp::from_secs(secs), 0),
            duration,
        )
    }

    #[test]
    fn test_select_eligible_age_boundary_is_exclusive() {
        let cutoff = Timestamp::from_secs(1_000);
        let rows = vec![
            record("p1", "at", 1_000, 1),
            record("p1", "older", 999, 2),
            record("p1", "newer", 1_001, 3),
        ];

        let eligible = select_eligible(rows, cutoff);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].play_id.as_str(), "older");
    }

    #[test]
    fn test_select_eligible_dedups_by_play() {
        let cutoff = Timestamp::from_secs(1_000);
        let rows = vec![
            record("p1", "a", 100, 1),
            record("p1", "a", 300, 3),
            record("p1", "a", 200, 2),
            record("p2", "a", 50, 9),
        ];

        let eligible = select_eligible(rows, cutoff);
        assert_eq!(eligible.len(), 2);
        assert_eq!(eligible[0].profile_id.as_str(), "p1");
        assert_eq!(eligible[0].duration_secs, 3);
        assert_eq!(eligible[1].profile_id.as_str(), "p2");
    }

    #[tokio::test]
    async fn test_advance_walks_partitions_in_order() {
        let store = Arc::new(MemoryStore::new());
        for profile in ["p1", "p2", "p3"] {
            store.insert_staging(record(profile, "a", 100, 1));
        }
        let scanner = CursorScanner::new(store.clone());
        let cutoff = Timestamp::from_secs(1_000);

        let mut cursor = Cursor::Start;
        let mut tokens = Vec::new();
        loop {
            match scanner.advance(cursor, cutoff).await.unwrap() {
                ScanOutcome::Partition { token, records, .. } => {
                    assert_eq!(records.len(), 1);
                    assert_eq!(partition_token(&records[0].profile_id), token);
                    tokens.push(token);
                    cursor = Cursor::After(token);
                }
                ScanOutcome::Exhausted => break,
            }
        }
        assert_eq!(tokens.len(), 3);
        assert!(tokens.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_advance_failure_keeps_partition_readable() {
        let store = Arc::new(MemoryStore::new());
        store.insert_staging(record("p1", "a", 100, 1));
        let scanner = CursorScanner::new(store.clone());
        let cutoff = Timestamp::from_secs(1_000);

        store.fail_next(StoreOp::ScanPartition, 1);
        assert!(scanner.advance(Cursor::Start, cutoff).await.is_err());

        let outcome = scanner.advance(Cursor::Start, cutoff).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Partition { scanned: 1, .. }));
    }

    #[tokio::test]
    async fn test_partition_with_only_young_rows() {
        let store = Arc::new(MemoryStore::new());
        store.insert_staging(record("p1", "a", 5_000, 1));
        let scanner = CursorScanner::new(store.clone());

        let outcome = scanner
            .advance(Cursor::Start, Timestamp::from_secs(1_000))
            .await
            .unwrap();
        match outcome {
            ScanOutcome::Partition {
                scanned, records, ..
            } => {
                assert_eq!(scanned, 1);
                assert!(records.is_empty());
            }
            ScanOutcome::Exhausted => panic!("expected a partition"),
        }
    }
}
