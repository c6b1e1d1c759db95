//! Timestamp types for Watchlog.
//!
//! This module provides the wall-clock [`Timestamp`] used for age cutoffs and
//! write timestamps, and [`WatchedAt`], the time-ordered unique id carried by
//! every watch tick.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::constants::MICROS_PER_SEC;

/// A wall-clock timestamp (microseconds since epoch).
///
/// # Example
///
/// ```rust
/// use watchlog_common::types::Timestamp;
///
/// let ts = Timestamp::now();
/// assert!(ts.as_micros() > 0);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Zero timestamp (epoch).
    pub const ZERO: Self = Self(0);

    /// Maximum timestamp value.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a timestamp from microseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Creates a timestamp from milliseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1000))
    }

    /// Creates a timestamp from seconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(MICROS_PER_SEC))
    }

    /// Creates a timestamp from the current system time.
    #[must_use]
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Self(duration.as_micros() as u64)
    }

    /// Returns the timestamp as microseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Returns the timestamp as milliseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0 / 1000
    }

    /// Returns the timestamp as seconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0 / MICROS_PER_SEC
    }

    /// Adds a duration to this timestamp.
    #[inline]
    #[must_use]
    pub fn add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_micros() as u64))
    }

    /// Subtracts a duration from this timestamp.
    #[inline]
    #[must_use]
    pub fn sub(self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration.as_micros() as u64))
    }

    /// Returns the duration elapsed between `earlier` and `self`.
    #[must_use]
    pub fn duration_since(self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}us)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 > 0 && self.0 < i64::MAX as u64 {
            let secs = (self.0 / MICROS_PER_SEC) as i64;
            let subsec_micros = (self.0 % MICROS_PER_SEC) as u32;
            if let Some(dt) = chrono::DateTime::from_timestamp(secs, subsec_micros * 1000) {
                return write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.6fZ"));
            }
        }
        write!(f, "{}us", self.0)
    }
}

impl From<u64> for Timestamp {
    #[inline]
    fn from(micros: u64) -> Self {
        Self::from_micros(micros)
    }
}

impl From<Timestamp> for u64 {
    #[inline]
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

/// Time-ordered unique id of a watch tick.
///
/// Laid out as a version 7 UUID: the leading 48 bits hold the Unix time in
/// milliseconds, so byte order equals time order and the event time can be
/// recovered with [`WatchedAt::timestamp`]. The remaining bits make ids
/// generated within the same millisecond unique.
///
/// ```text
/// +----------------+---------+------------+---------+----------------+
/// | unix_ms (48)   | ver (4) | rand_a(12) | var (2) | rand_b (62)    |
/// +----------------+---------+------------+---------+----------------+
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchedAt(Uuid);

impl WatchedAt {
    /// The nil id. Never produced for a real tick.
    pub const NIL: Self = Self(Uuid::nil());

    const MAX_MILLIS: u64 = (1 << 48) - 1;

    /// Creates an id for a tick observed now.
    #[must_use]
    pub fn now() -> Self {
        Self::from_timestamp(Timestamp::now())
    }

    /// Creates an id for a tick observed at `ts` (millisecond precision).
    #[must_use]
    pub fn from_timestamp(ts: Timestamp) -> Self {
        let random = Uuid::new_v4();
        let random = random.as_bytes();
        let mut tail = [0u8; 10];
        tail.copy_from_slice(&random[6..16]);
        Self::build(ts, tail)
    }

    /// Creates a deterministic id for `ts`, distinguished by `seq`.
    ///
    /// Ids built from the same timestamp order by `seq`.
    #[must_use]
    pub fn from_parts(ts: Timestamp, seq: u64) -> Self {
        let mut tail = [0u8; 10];
        tail[2..].copy_from_slice(&seq.to_be_bytes());
        Self::build(ts, tail)
    }

    fn build(ts: Timestamp, tail: [u8; 10]) -> Self {
        let millis = ts.as_millis().min(Self::MAX_MILLIS);
        let mut bytes = [0u8; 16];
        bytes[..6].copy_from_slice(&millis.to_be_bytes()[2..]);
        bytes[6..].copy_from_slice(&tail);
        bytes[6] = 0x70 | (bytes[6] & 0x0F);
        bytes[8] = 0x80 | (bytes[8] & 0x3F);
        Self(Uuid::from_bytes(bytes))
    }

    /// Wraps an existing UUID.
    #[inline]
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true for the nil id.
    #[inline]
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Returns the wall-clock time encoded in this id.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        let bytes = self.0.as_bytes();
        let mut millis = [0u8; 8];
        millis[2..].copy_from_slice(&bytes[..6]);
        Timestamp::from_millis(u64::from_be_bytes(millis))
    }

    /// Returns true if this tick happened strictly before `cutoff`.
    #[inline]
    #[must_use]
    pub fn is_older_than(&self, cutoff: Timestamp) -> bool {
        self.timestamp() < cutoff
    }
}

impl fmt::Debug for WatchedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WatchedAt({} @ {})", self.0, self.timestamp())
    }
}

impl fmt::Display for WatchedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
