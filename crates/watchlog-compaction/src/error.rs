//! Compaction error types.

use thiserror::Error;

use watchlog_common::error::{ErrorCode, WatchlogError};
use watchlog_store::StoreError;

use crate::scheduler::LifecycleState;

/// Result type for compaction operations.
pub type CompactionResult<T> = Result<T, CompactionError>;

/// Errors raised by the compaction scheduler.
#[derive(Debug, Error)]
pub enum CompactionError {
    /// Store request failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration or other common error.
    #[error(transparent)]
    Common(#[from] WatchlogError),

    /// The worker pool no longer accepts tasks.
    #[error("worker pool is closed")]
    PoolClosed,

    /// A lifecycle operation was called in the wrong state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Attempted operation.
        operation: &'static str,
        /// State at the time of the call.
        state: LifecycleState,
    },

    /// In-flight work did not drain within the shutdown grace period.
    #[error("shutdown did not complete within {grace_ms} ms")]
    ShutdownTimeout {
        /// Configured grace period.
        grace_ms: u64,
    },
}

impl CompactionError {
    /// Creates an invalid state error.
    pub fn invalid_state(operation: &'static str, state: LifecycleState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::Common(WatchlogError::invalid_config(message))
    }

    /// Returns true if retrying the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns the stable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Store(e) => e.code(),
            Self::Common(e) => e.code(),
            Self::PoolClosed => ErrorCode::PoolClosed,
            Self::InvalidState { .. } => ErrorCode::InvalidState,
            Self::ShutdownTimeout { .. } => ErrorCode::ShutdownTimeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CompactionError::PoolClosed.code(), ErrorCode::PoolClosed);
        assert_eq!(
            CompactionError::invalid_config("bad").code(),
            ErrorCode::InvalidConfig
        );
        let err: CompactionError = StoreError::unavailable("down").into();
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_invalid_state_display() {
        let err = CompactionError::invalid_state("start", LifecycleState::Created);
        assert_eq!(err.to_string(), "cannot start while created");
        assert!(!err.is_retryable());
    }
}
