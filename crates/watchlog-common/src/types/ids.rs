//! Core identifier types for Watchlog.
//!
//! These types provide type-safe wrappers around the keys used by the
//! watch-history tables, preventing accidental misuse of profile and play
//! identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Profile identifier - the partition key of every watch-history table.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    /// Creates a new `ProfileId`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProfileId({})", self.0)
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Play identifier - the clustering key of the staging and canonical tables.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayId(String);

impl PlayId {
    /// Creates a new `PlayId`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayId({})", self.0)
    }
}

impl fmt::Display for PlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Primary key of a canonical row: one profile watching one play.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayKey {
    /// Partition key.
    pub profile_id: ProfileId,
    /// Clustering key.
    pub play_id: PlayId,
}

impl PlayKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(profile_id: ProfileId, play_id: PlayId) -> Self {
        Self {
            profile_id,
            play_id,
        }
    }
}

impl fmt::Debug for PlayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayKey({}/{})", self.profile_id, self.play_id)
    }
}

impl fmt::Display for PlayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.profile_id, self.play_id)
    }
}

/// Position of a partition in the store's token ring.
///
/// Tokens are signed 64-bit values, totally ordered, and enumerated in
/// ascending order by the store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PartitionToken(i64);

impl PartitionToken {
    /// Smallest token on the ring.
    pub const MIN: Self = Self(i64::MIN);

    /// Largest token on the ring.
    pub const MAX: Self = Self(i64::MAX);

    /// Creates a token from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(token: i64) -> Self {
        Self(token)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Debug for PartitionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartitionToken({})", self.0)
    }
}

impl fmt::Display for PartitionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PartitionToken {
    #[inline]
    fn from(token: i64) -> Self {
        Self::new(token)
    }
}

impl From<PartitionToken> for i64 {
    #[inline]
    fn from(token: PartitionToken) -> Self {
        token.0
    }
}

/// Position of a sweep in partition space.
///
/// `Start` sorts before every token, so a cursor only ever moves forward:
/// from `Start` to the first partition, then to strictly greater tokens.
/// Keeping the start position out of the token domain means a partition
/// hashed to token `0` is visited like any other.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Cursor {
    /// Before the first partition.
    #[default]
    Start,
    /// Just after the given partition.
    After(PartitionToken),
}

impl Cursor {
    /// Returns true if no partition has been visited yet.
    #[inline]
    #[must_use]
    pub const fn is_start(self) -> bool {
        matches!(self, Self::Start)
    }

    /// Returns the last visited token, if any.
    #[inline]
    #[must_use]
    pub const fn token(self) -> Option<PartitionToken> {
        match self {
            Self::Start => None,
            Self::After(token) => Some(token),
        }
    }

    /// Returns true if `token` lies strictly ahead of this cursor.
    #[inline]
    #[must_use]
    pub fn is_before(self, token: PartitionToken) -> bool {
        match self {
            Self::Start => true,
            Self::After(current) => token > current,
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Cursor(START)"),
            Self::After(token) => write!(f, "Cursor(>{})", token.0),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::After(token) => write!(f, "{}", token.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_ordering() {
        assert!(Cursor::Start < Cursor::After(PartitionToken::MIN));
        assert!(Cursor::After(PartitionToken::new(-5)) < Cursor::After(PartitionToken::new(0)));
        assert_eq!(Cursor::default(), Cursor::Start);
    }

    #[test]
    fn test_cursor_is_before() {
        let zero = PartitionToken::new(0);
        assert!(Cursor::Start.is_before(zero));
        assert!(Cursor::Start.is_before(PartitionToken::MIN));
        assert!(!Cursor::After(zero).is_before(zero));
        assert!(Cursor::After(zero).is_before(PartitionToken::new(1)));
        assert_eq!(Cursor::After(zero).token(), Some(zero));
        assert_eq!(Cursor::Start.token(), None);
    }

    #[test]
    fn test_play_key_display() {
        let key = PlayKey::new(ProfileId::new("p1"), PlayId::new("a"));
        assert_eq!(key.to_string(), "p1/a");
        assert_eq!(format!("{:?}", key), "PlayKey(p1/a)");
    }

    #[test]
    fn test_token_conversions() {
        let token = PartitionToken::from(-42);
        let raw: i64 = token.into();
        assert_eq!(raw, -42);
        assert!(PartitionToken::MIN < token && token < PartitionToken::MAX);
    }
}
