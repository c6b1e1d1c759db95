//! # watchlog-common
//!
//! Common types, errors, and configuration for Watchlog.
//!
//! This crate provides the foundational types shared by the store adapter,
//! the compaction scheduler and the daemon. It includes:
//!
//! - **Types**: `ProfileId`, `PlayId`, `PartitionToken`, `WatchedAt` and the
//!   `PlayRecord` that flows from the staging table into canonical storage
//! - **Errors**: `WatchlogError` with stable `ErrorCode`s
//! - **Config**: `CompactionConfig`, the user-facing scheduler settings
//! - **Clock**: injectable wall clock used to compute age cutoffs
//!
//! ## Example
//!
//! ```rust
//! use watchlog_common::types::{PlayId, PlayRecord, ProfileId, Timestamp, WatchedAt};
//!
//! let at = WatchedAt::from_timestamp(Timestamp::from_secs(1_700_000_000));
//! let record = PlayRecord::new(ProfileId::new("p1"), PlayId::new("a"), at, 120);
//! assert_eq!(record.watched_at.timestamp().as_secs(), 1_700_000_000);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::CompactionConfig;
pub use error::{ErrorCode, WatchlogError, WatchlogResult};
pub use types::{
    Cursor, PartitionToken, PlayId, PlayKey, PlayRecord, ProfileId, Timestamp, WatchedAt,
};
