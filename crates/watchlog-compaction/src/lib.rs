//! # watchlog-compaction
//!
//! Background compaction of watch history.
//!
//! Playback clients write every watch tick into a staging table. This crate
//! periodically sweeps that table partition by partition and moves ticks
//! older than a configured age into the canonical table and the
//! recently-watched index, deleting them from staging in the same batch.
//!
//! ## Components
//!
//! - [`CursorScanner`]: token-ordered partition reads with age filtering and
//!   per-play deduplication
//! - [`MigrationExecutor`]: builds and applies the per-partition batch
//! - [`WorkerPool`]: bounded concurrency with back-pressure
//! - [`Sweeper`]: one full pass with retry and cancellation
//! - [`Scheduler`]: periodic timer, lifecycle and graceful shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use watchlog_common::clock::SystemClock;
//! use watchlog_common::config::CompactionConfig;
//! use watchlog_compaction::{Lifecycle, Scheduler, SchedulerOptions};
//! use watchlog_store::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = SchedulerOptions::from_config(&CompactionConfig::default())?;
//! let scheduler = Scheduler::new(MemoryStore::shared(), SystemClock::shared(), options);
//! scheduler.init_pool()?;
//! scheduler.start()?;
//! // ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod error;
pub mod migration;
pub mod pool;
pub mod scanner;
pub mod scheduler;
pub mod stats;
pub mod sweep;

pub use backoff::{Backoff, BackoffStep, RetryPolicy};
pub use error::{CompactionError, CompactionResult};
pub use migration::{MigrationExecutor, MigrationOutcome};
pub use pool::{TaskGroup, WorkerPool};
pub use scanner::{CursorScanner, ScanOutcome};
pub use scheduler::{Lifecycle, LifecycleState, Scheduler, SchedulerOptions};
pub use stats::{SchedulerStats, StatsSnapshot};
pub use sweep::{SweepEnd, SweepReport, SweepState, Sweeper};
