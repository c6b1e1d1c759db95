//! System-wide constants for Watchlog.

// =============================================================================
// Table Names
// =============================================================================

/// Staging table holding raw, not-yet-migrated watch ticks.
pub const STAGING_TABLE: &str = "recent_watch";

/// Canonical table holding the current watch position per profile and play.
pub const CANONICAL_TABLE: &str = "watched";

/// Index table ordered by `watched_at` descending per profile.
pub const INDEX_TABLE: &str = "ordered_watch";

// =============================================================================
// Scheduler Limits
// =============================================================================

/// Minimum number of worker pool slots.
pub const MIN_WORKER_POOL_SIZE: usize = 1;

/// Default number of worker pool slots.
pub const DEFAULT_WORKER_POOL_SIZE: usize = 8;

/// Minimum cooldown between two sweeps, in seconds.
pub const MIN_SWEEP_COOLDOWN_SECS: u64 = 10;

/// Default cooldown between two sweeps, in seconds.
pub const DEFAULT_SWEEP_COOLDOWN_SECS: u64 = 60;

/// Minimum age, in hours, before a staging row becomes eligible.
pub const MIN_AGE_LIMIT_HOURS: u64 = 1;

/// Default age, in hours, before a staging row becomes eligible.
pub const DEFAULT_AGE_LIMIT_HOURS: u64 = 72;

// =============================================================================
// Retry Policy
// =============================================================================

/// Initial back-off after a transient scan error, in milliseconds.
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 1_000;

/// Upper bound of the scan back-off, in milliseconds.
///
/// Matches the fixed ten second delay the scanner historically used.
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;

/// Consecutive scan failures after which a sweep is abandoned.
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 30;

/// Consecutive scan failures after which a sweep is reported as stuck.
pub const DEFAULT_STUCK_AFTER_ATTEMPTS: u32 = 5;

/// Grace period granted to an in-flight sweep on shutdown, in seconds.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

// =============================================================================
// Time
// =============================================================================

/// Microseconds per second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Seconds per hour.
pub const SECS_PER_HOUR: u64 = 3_600;
