//! # watchlog-server
//!
//! The `watchlogd` daemon: configuration loading and the wiring that runs
//! the watch-history compaction scheduler against a store until shutdown.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod daemon;

pub use config::{ServerConfig, StoreConfig};
