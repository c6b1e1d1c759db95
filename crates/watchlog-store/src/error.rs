//! Store error types.
//!
//! This module defines the errors surfaced by a [`StoreAdapter`](crate::StoreAdapter).
//! "Not found" on partition enumeration is not an error; adapters report it
//! as `Ok(None)`.

use thiserror::Error;

use watchlog_common::error::ErrorCode;
use watchlog_common::types::PartitionToken;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Not enough replicas were reachable.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Coordinator message.
        reason: String,
    },

    /// A request did not complete in time.
    #[error("store request timed out after {timeout_ms} ms")]
    Timeout {
        /// Request timeout in milliseconds.
        timeout_ms: u64,
    },

    /// A read failed on the coordinator.
    #[error("read failed for partition {token:?}: {reason}")]
    ReadFailure {
        /// Partition being read, if the read was partition-scoped.
        token: Option<PartitionToken>,
        /// Coordinator message.
        reason: String,
    },

    /// A batch or statement failed to apply.
    #[error("write failed: {reason}")]
    WriteFailure {
        /// Coordinator message.
        reason: String,
    },

    /// The statement was rejected by the store.
    #[error("invalid query: {reason}")]
    InvalidQuery {
        /// Why the statement was rejected.
        reason: String,
    },

    /// The store handle was closed.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Creates an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a read failure error.
    pub fn read_failure(token: Option<PartitionToken>, reason: impl Into<String>) -> Self {
        Self::ReadFailure {
            token,
            reason: reason.into(),
        }
    }

    /// Creates a write failure error.
    pub fn write_failure(reason: impl Into<String>) -> Self {
        Self::WriteFailure {
            reason: reason.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. }
                | Self::Timeout { .. }
                | Self::ReadFailure { .. }
                | Self::WriteFailure { .. }
        )
    }

    /// Returns the stable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable { .. } | Self::Closed => ErrorCode::StoreUnavailable,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::ReadFailure { .. } => ErrorCode::ReadFailed,
            Self::WriteFailure { .. } => ErrorCode::WriteFailed,
            Self::InvalidQuery { .. } => ErrorCode::InvalidArgument,
        }
    }
}
