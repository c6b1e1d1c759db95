//! Watch tick records.

use serde::{Deserialize, Serialize};

use super::{PlayId, PlayKey, ProfileId, WatchedAt};

/// One observed watch tick.
///
/// A record is identified by `(profile_id, play_id)`; a later tick for the
/// same pair carries a greater `watched_at` and supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRecord {
    /// Profile that watched.
    pub profile_id: ProfileId,
    /// What was watched.
    pub play_id: PlayId,
    /// Time-ordered id of the tick.
    pub watched_at: WatchedAt,
    /// Watch position in seconds.
    pub duration_secs: u32,
}

impl PlayRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(
        profile_id: ProfileId,
        play_id: PlayId,
        watched_at: WatchedAt,
        duration_secs: u32,
    ) -> Self {
        Self {
            profile_id,
            play_id,
            watched_at,
            duration_secs,
        }
    }

    /// Returns the canonical key of this record.
    #[must_use]
    pub fn key(&self) -> PlayKey {
        PlayKey::new(self.profile_id.clone(), self.play_id.clone())
    }

    /// Returns true if this record supersedes `other`.
    #[inline]
    #[must_use]
    pub fn supersedes(&self, other: &Self) -> bool {
        self.watched_at > other.watched_at
    }
}
