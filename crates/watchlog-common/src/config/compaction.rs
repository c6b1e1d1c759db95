//! Compaction scheduler configuration.
//!
//! These structures define every configurable aspect of the watch-history
//! compaction scheduler. They deserialize from the `[compaction]` section of
//! the daemon's TOML file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_AGE_LIMIT_HOURS, DEFAULT_RETRY_INITIAL_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS,
    DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_STUCK_AFTER_ATTEMPTS,
    DEFAULT_SWEEP_COOLDOWN_SECS, DEFAULT_WORKER_POOL_SIZE, MIN_AGE_LIMIT_HOURS,
    MIN_SWEEP_COOLDOWN_SECS, MIN_WORKER_POOL_SIZE, SECS_PER_HOUR,
};
use crate::error::{WatchlogError, WatchlogResult};

/// Compaction scheduler configuration.
///
/// # Example
///
/// ```rust
/// use watchlog_common::config::CompactionConfig;
///
/// let config = CompactionConfig::default()
///     .with_worker_pool_size(4)
///     .with_age_limit_hours(24);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Number of concurrent migration slots.
    /// Default: 8
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// Delay between the end of one sweep timer wait and the next.
    /// Must be at least 10 seconds.
    /// Default: 60
    #[serde(default = "default_sweep_cooldown_seconds")]
    pub sweep_cooldown_seconds: u64,

    /// Age a staging row must exceed before it is migrated.
    /// Default: 72
    #[serde(default = "default_age_limit_hours")]
    pub age_limit_hours: u64,

    /// Time granted to an in-flight sweep to drain on shutdown.
    /// Default: 30
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,

    /// Back-off policy for transient scan errors.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_worker_pool_size() -> usize {
    DEFAULT_WORKER_POOL_SIZE
}

fn default_sweep_cooldown_seconds() -> u64 {
    DEFAULT_SWEEP_COOLDOWN_SECS
}

fn default_age_limit_hours() -> u64 {
    DEFAULT_AGE_LIMIT_HOURS
}

fn default_shutdown_grace_seconds() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_SECS
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            sweep_cooldown_seconds: default_sweep_cooldown_seconds(),
            age_limit_hours: default_age_limit_hours(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
            retry: RetryConfig::default(),
        }
    }
}

impl CompactionConfig {
    /// Sets the worker pool size.
    #[must_use]
    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    /// Sets the sweep cooldown in seconds.
    #[must_use]
    pub fn with_sweep_cooldown_seconds(mut self, secs: u64) -> Self {
        self.sweep_cooldown_seconds = secs;
        self
    }

    /// Sets the eligibility age in hours.
    #[must_use]
    pub fn with_age_limit_hours(mut self, hours: u64) -> Self {
        self.age_limit_hours = hours;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the shutdown grace period in seconds.
    #[must_use]
    pub fn with_shutdown_grace_seconds(mut self, secs: u64) -> Self {
        self.shutdown_grace_seconds = secs;
        self
    }

    /// Returns the sweep cooldown.
    #[must_use]
    pub fn sweep_cooldown(&self) -> Duration {
        Duration::from_secs(self.sweep_cooldown_seconds)
    }

    /// Returns the eligibility age.
    #[must_use]
    pub fn age_limit(&self) -> Duration {
        Duration::from_secs(self.age_limit_hours.saturating_mul(SECS_PER_HOUR))
    }

    /// Returns the shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> WatchlogResult<()> {
        if self.worker_pool_size < MIN_WORKER_POOL_SIZE {
            return Err(WatchlogError::invalid_config(format!(
                "worker_pool_size must be at least {MIN_WORKER_POOL_SIZE}"
            )));
        }

        if self.sweep_cooldown_seconds < MIN_SWEEP_COOLDOWN_SECS {
            return Err(WatchlogError::invalid_config(format!(
                "sweep_cooldown_seconds must be at least {MIN_SWEEP_COOLDOWN_SECS}"
            )));
        }

        if self.age_limit_hours < MIN_AGE_LIMIT_HOURS {
            return Err(WatchlogError::invalid_config(format!(
                "age_limit_hours must be at least {MIN_AGE_LIMIT_HOURS}"
            )));
        }

        self.retry.validate()
    }
}

/// Back-off policy for transient scan errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// First back-off delay in milliseconds. Doubles on every failure.
    /// Default: 1000
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound of the back-off delay in milliseconds.
    /// Default: 10000
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Consecutive failures after which the sweep is abandoned.
    /// Default: 30
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Consecutive failures after which the sweep is reported stuck.
    /// Default: 5
    #[serde(default = "default_stuck_after_attempts")]
    pub stuck_after_attempts: u32,
}

fn default_initial_delay_ms() -> u64 {
    DEFAULT_RETRY_INITIAL_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_RETRY_MAX_DELAY_MS
}

fn default_max_attempts() -> u32 {
    DEFAULT_RETRY_MAX_ATTEMPTS
}

fn default_stuck_after_attempts() -> u32 {
    DEFAULT_STUCK_AFTER_ATTEMPTS
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            stuck_after_attempts: default_stuck_after_attempts(),
        }
    }
}

impl RetryConfig {
    /// Returns the initial delay.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Returns the maximum delay.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Validates the policy.
    pub fn validate(&self) -> WatchlogResult<()> {
        if self.initial_delay_ms == 0 {
            return Err(WatchlogError::invalid_config(
                "retry.initial_delay_ms must be greater than 0",
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(WatchlogError::invalid_config(
                "retry.max_delay_ms cannot be less than retry.initial_delay_ms",
            ));
        }
        if self.max_attempts == 0 {
            return Err(WatchlogError::invalid_config(
                "retry.max_attempts must be greater than 0",
            ));
        }
        if self.stuck_after_attempts == 0 || self.stuck_after_attempts > self.max_attempts {
            return Err(WatchlogError::invalid_config(
                "retry.stuck_after_attempts must be between 1 and retry.max_attempts",
            ));
        }
        Ok(())
    }
}
