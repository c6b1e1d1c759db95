//! # watchlog-store
//!
//! Store adapter contract for the watch-history keyspace.
//!
//! The compaction core never talks to a database client directly. It reads
//! and writes through [`StoreAdapter`]:
//!
//! - `next_partition_token`: token-ordered partition enumeration
//! - `scan_partition` / `read_canonical`: partition-scoped reads
//! - `execute_batch`: logged multi-table writes
//!
//! [`MemoryStore`] implements the contract in process and is what the tests
//! and the standalone daemon run against.
//!
//! ```text
//!   recent_watch ──scan──▶ compaction ──batch──▶ watched + ordered_watch
//!        ▲                                            (and staging delete)
//!        └──────────────── token cursor ─────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod batch;
pub mod error;
pub mod memory;
pub mod schema;
pub mod token;

pub use adapter::{StagingRow, StoreAdapter, StoreFuture};
pub use batch::{Batch, Consistency, Statement};
pub use error::{StoreError, StoreResult};
pub use memory::{
    CanonicalRow, IndexRow, MemoryStore, StoreOp, StoreStats, DEFAULT_TOMBSTONE_GRACE,
};
pub use token::partition_token;
