//! Partition token computation.
//!
//! Maps a profile id onto the signed 64-bit token ring. Distinct profiles
//! may collide on one token, so everything read by token is keyed by
//! [`PlayKey`](watchlog_common::types::PlayKey), never by play id alone.

use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use watchlog_common::types::{PartitionToken, ProfileId};

/// Hash seeds. Changing them reshuffles every partition.
const TOKEN_SEED_A: u64 = 0x7761_7463_686c_6f67;
const TOKEN_SEED_B: u64 = 0x7265_6365_6e74_5f77;

/// Returns the partition token owning `profile_id`.
#[inline]
pub fn partition_token(profile_id: &ProfileId) -> PartitionToken {
    let mut hasher = SipHasher13::new_with_keys(TOKEN_SEED_A, TOKEN_SEED_B);
    hasher.write(profile_id.as_str().as_bytes());
    PartitionToken::new(hasher.finish() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_stable() {
        let profile = ProfileId::new("p1");
        assert_eq!(partition_token(&profile), partition_token(&profile));
    }

    #[test]
    fn test_tokens_spread() {
        let tokens: std::collections::HashSet<_> = (0..256)
            .map(|i| partition_token(&ProfileId::new(format!("profile-{i}"))))
            .collect();
        assert!(tokens.len() > 250);
        assert!(tokens.iter().any(|t| t.as_i64() < 0));
        assert!(tokens.iter().any(|t| t.as_i64() > 0));
    }
}
