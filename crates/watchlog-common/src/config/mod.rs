//! Configuration for Watchlog.
//!
//! This module provides the user-facing configuration of the compaction
//! scheduler.

mod compaction;

pub use compaction::{CompactionConfig, RetryConfig};
