//! Write statements and batches.
//!
//! A migration is expressed as one logged [`Batch`] of [`Statement`]s. The
//! store applies the batch with partition-local atomicity only. Statements
//! carry typed values; an adapter binds them as query parameters.

use std::fmt;

use watchlog_common::types::{PlayId, PlayKey, ProfileId, Timestamp, WatchedAt};

/// Per-statement consistency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Consistency {
    /// A write is accepted once any node (including a hinted handoff) has it.
    Any,
    /// One replica.
    #[default]
    One,
    /// One replica in the local datacenter.
    LocalOne,
    /// Majority of replicas.
    Quorum,
    /// Majority of replicas in the local datacenter.
    LocalQuorum,
    /// Every replica.
    All,
}

impl Consistency {
    /// Returns true if the level may be used for reads.
    pub const fn is_readable(self) -> bool {
        !matches!(self, Self::Any)
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "ANY",
            Self::One => "ONE",
            Self::LocalOne => "LOCAL_ONE",
            Self::Quorum => "QUORUM",
            Self::LocalQuorum => "LOCAL_QUORUM",
            Self::All => "ALL",
        };
        f.write_str(name)
    }
}

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Moves the canonical position of a play.
    UpdateCanonical {
        /// Row key.
        key: PlayKey,
        /// New position.
        watched_at: WatchedAt,
        /// New duration.
        duration_secs: u32,
    },
    /// Adds an index entry.
    InsertIndex {
        /// Row key.
        key: PlayKey,
        /// Clustering key of the entry.
        watched_at: WatchedAt,
        /// Duration stored with the entry.
        duration_secs: u32,
    },
    /// Retires an index entry.
    DeleteIndex {
        /// Partition key.
        profile_id: ProfileId,
        /// Clustering key of the retired entry.
        watched_at: WatchedAt,
    },
    /// Retires a staging row with an explicit write timestamp.
    DeleteStaging {
        /// Partition key.
        profile_id: ProfileId,
        /// Clustering key.
        play_id: PlayId,
        /// `USING TIMESTAMP` of the tombstone.
        timestamp: Timestamp,
    },
}

/// A logged group of statements applied together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    consistency: Consistency,
    statements: Vec<Statement>,
}

impl Batch {
    /// Creates an empty logged batch at consistency `ONE`.
    pub fn logged() -> Self {
        Self {
            consistency: Consistency::One,
            statements: Vec::new(),
        }
    }

    /// Sets the write consistency.
    #[must_use]
    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Appends a statement.
    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    /// Returns the write consistency.
    pub fn consistency(&self) -> Consistency {
        self.consistency
    }

    /// Returns the statements in order.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Consumes the batch and returns its statements.
    pub fn into_statements(self) -> Vec<Statement> {
        self.statements
    }

    /// Returns the number of statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Returns true if the batch has no statements.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::logged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_builder() {
        let mut batch = Batch::logged().with_consistency(Consistency::Any);
        assert!(batch.is_empty());
        assert_eq!(Batch::default().consistency(), Consistency::One);

        batch.push(Statement::InsertIndex {
            key: PlayKey::new(ProfileId::new("p1"), PlayId::new("a")),
            watched_at: WatchedAt::NIL,
            duration_secs: 1,
        });
        batch.push(Statement::DeleteStaging {
            profile_id: ProfileId::new("p1"),
            play_id: PlayId::new("it's"),
            timestamp: Timestamp::from_micros(42),
        });
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.consistency(), Consistency::Any);
        assert!(matches!(
            batch.statements()[1],
            Statement::DeleteStaging { ref play_id, .. } if play_id.as_str() == "it's"
        ));
        assert_eq!(batch.into_statements().len(), 2);
    }

    #[test]
    fn test_consistency() {
        assert!(!Consistency::Any.is_readable());
        assert!(Consistency::One.is_readable());
        assert_eq!(Consistency::LocalQuorum.to_string(), "LOCAL_QUORUM");
    }
}
