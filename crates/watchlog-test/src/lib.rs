//! # watchlog-test
//!
//! Integration tests for Watchlog.
//!
//! This crate contains:
//! - Fixtures: a manual clock and in-memory store wired together
//! - A recording store wrapper for ordering and concurrency assertions
//! - End-to-end compaction and scheduler tests under `tests/`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fixtures;
pub mod recording;

pub use fixtures::{fast_options, hours, key, Harness, AGE_LIMIT_HOURS, NOW_SECS};
pub use recording::{Gauge, RecordingStore, StoreEvent};
