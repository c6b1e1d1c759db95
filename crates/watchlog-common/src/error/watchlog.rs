//! Shared error types.

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Malformed request or argument.
    InvalidArgument = 0x0003,
    /// Operation timed out.
    Timeout = 0x0004,

    // Store errors (0x0200 - 0x02FF)
    /// The store is unavailable.
    StoreUnavailable = 0x0200,
    /// A read against the store failed.
    ReadFailed = 0x0201,
    /// A write against the store failed.
    WriteFailed = 0x0202,

    // Scheduler errors (0x0300 - 0x03FF)
    /// Worker pool is closed.
    PoolClosed = 0x0300,
    /// Lifecycle operation invoked in the wrong state.
    InvalidState = 0x0301,
    /// Graceful shutdown exceeded its grace period.
    ShutdownTimeout = 0x0302,

    // Configuration errors (0x0400 - 0x04FF)
    /// Configuration failed validation.
    InvalidConfig = 0x0400,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x02 => "Store",
            0x03 => "Scheduler",
            0x04 => "Config",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The shared error type for Watchlog.
///
/// Component crates define their own richer errors and convert into this
/// type at crate boundaries that need a single error surface.
///
/// # Example
///
/// ```rust
/// use watchlog_common::error::{WatchlogError, WatchlogResult};
///
/// fn check_pool_size(size: usize) -> WatchlogResult<()> {
///     if size == 0 {
///         return Err(WatchlogError::invalid_config("worker_pool_size must be at least 1"));
///     }
///     Ok(())
/// }
/// assert!(check_pool_size(0).is_err());
/// ```
#[derive(Debug, Error)]
pub enum WatchlogError {
    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },
}

impl WatchlogError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
        }
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = WatchlogError::invalid_config("worker_pool_size must be at least 1");
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
        assert_eq!(err.code().category(), "Config");
        assert_eq!(ErrorCode::PoolClosed.category(), "Scheduler");
        assert_eq!(ErrorCode::StoreUnavailable.category(), "Store");
    }

    #[test]
    fn test_error_display() {
        let err = WatchlogError::invalid_config("age_limit_hours must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid configuration: age_limit_hours must be at least 1"
        );
        assert_eq!(ErrorCode::Timeout.as_u16(), 0x0004);
    }
}
