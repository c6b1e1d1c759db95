//! Error handling for Watchlog.
//!
//! This module provides the shared error type and result alias used
//! across Watchlog components.

mod watchlog;

pub use watchlog::{ErrorCode, WatchlogError};

/// Result type alias for Watchlog operations.
pub type WatchlogResult<T> = std::result::Result<T, WatchlogError>;
