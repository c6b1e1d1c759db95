//! Persisted layout of the watch-history tables.
//!
//! All three tables are partitioned by `profile_id`. Staging and canonical
//! rows cluster by `play_id`; index rows cluster by `watched_at` descending
//! so a partition reads newest-first.

use watchlog_common::constants::{CANONICAL_TABLE, INDEX_TABLE, STAGING_TABLE};

/// DDL for the staging table.
pub const CREATE_STAGING_TABLE: &str = "CREATE TABLE IF NOT EXISTS recent_watch (
    profile_id text,
    play_id text,
    watched_at timeuuid,
    duration int,
    PRIMARY KEY ((profile_id), play_id)
);";

/// DDL for the canonical table.
pub const CREATE_CANONICAL_TABLE: &str = "CREATE TABLE IF NOT EXISTS watched (
    profile_id text,
    play_id text,
    watched_at timeuuid,
    duration int,
    PRIMARY KEY ((profile_id), play_id)
);";

/// DDL for the index table.
pub const CREATE_INDEX_TABLE: &str = "CREATE TABLE IF NOT EXISTS ordered_watch (
    profile_id text,
    watched_at timeuuid,
    play_id text,
    duration int,
    PRIMARY KEY ((profile_id), watched_at)
) WITH CLUSTERING ORDER BY (watched_at DESC);";

/// A table of the watch-history keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// `recent_watch`.
    Staging,
    /// `watched`.
    Canonical,
    /// `ordered_watch`.
    Index,
}

impl Table {
    /// All tables, in creation order.
    pub const ALL: [Table; 3] = [Table::Staging, Table::Canonical, Table::Index];

    /// Returns the table name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Staging => STAGING_TABLE,
            Self::Canonical => CANONICAL_TABLE,
            Self::Index => INDEX_TABLE,
        }
    }

    /// Returns the DDL creating this table.
    pub const fn ddl(self) -> &'static str {
        match self {
            Self::Staging => CREATE_STAGING_TABLE,
            Self::Canonical => CREATE_CANONICAL_TABLE,
            Self::Index => CREATE_INDEX_TABLE,
        }
    }
}

/// Keyspace replication strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplicationClass {
    /// Single-datacenter placement.
    #[default]
    SimpleStrategy,
    /// Per-datacenter placement.
    NetworkTopologyStrategy,
}

impl ReplicationClass {
    /// Parses a strategy name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "SimpleStrategy" => Some(Self::SimpleStrategy),
            "NetworkTopologyStrategy" => Some(Self::NetworkTopologyStrategy),
            _ => None,
        }
    }

    /// Returns the strategy name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SimpleStrategy => "SimpleStrategy",
            Self::NetworkTopologyStrategy => "NetworkTopologyStrategy",
        }
    }
}

/// Returns the DDL creating `keyspace`.
pub fn create_keyspace(keyspace: &str, class: ReplicationClass, replication_factor: u32) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {keyspace} WITH replication = \
         {{'class': '{}', 'replication_factor': {replication_factor}}};",
        class.as_str()
    )
}

/// Returns the DDL for every table.
pub fn create_statements() -> Vec<&'static str> {
    Table::ALL.iter().map(|table| table.ddl()).collect()
}
