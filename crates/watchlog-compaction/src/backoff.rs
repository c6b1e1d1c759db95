//! Bounded exponential back-off for scan retries.

use std::time::Duration;

use watchlog_common::config::RetryConfig;

/// Retry policy for transient scan failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound of any delay.
    pub max_delay: Duration,
    /// Consecutive failures after which the sweep is abandoned.
    pub max_attempts: u32,
    /// Consecutive failures after which the sweep is reported stuck.
    pub stuck_after_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            max_attempts: config.max_attempts,
            stuck_after_attempts: config.stuck_after_attempts,
        }
    }
}

/// Next action after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    /// Sleep for `delay` and retry.
    Retry {
        /// Time to wait.
        delay: Duration,
        /// Consecutive failures so far.
        attempt: u32,
        /// True once the failure streak reached the stuck threshold.
        stuck: bool,
    },
    /// Give up on the current sweep.
    GiveUp {
        /// Consecutive failures so far.
        attempts: u32,
    },
}

/// Tracks a streak of consecutive failures.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempts: u32,
}

impl Backoff {
    /// Creates a back-off with no failures recorded.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Records a failure and returns what to do next.
    pub fn on_failure(&mut self) -> BackoffStep {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts >= self.policy.max_attempts {
            return BackoffStep::GiveUp {
                attempts: self.attempts,
            };
        }

        BackoffStep::Retry {
            delay: self.delay_for(self.attempts),
            attempt: self.attempts,
            stuck: self.is_stuck(),
        }
    }

    /// Clears the failure streak.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Returns the current failure streak.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns true if the streak reached the stuck threshold.
    pub fn is_stuck(&self) -> bool {
        self.attempts >= self.policy.stuck_after_attempts
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.policy
            .initial_delay
            .saturating_mul(1u32 << shift)
            .min(self.policy.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
            max_attempts: 8,
            stuck_after_attempts: 3,
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let mut backoff = Backoff::new(policy());
        let delays: Vec<_> = (0..6)
            .map(|_| match backoff.on_failure() {
                BackoffStep::Retry { delay, .. } => delay.as_millis(),
                BackoffStep::GiveUp { .. } => panic!("gave up early"),
            })
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);
    }

    #[test]
    fn test_stuck_then_give_up() {
        let mut backoff = Backoff::new(policy());
        for attempt in 1..8 {
            match backoff.on_failure() {
                BackoffStep::Retry { stuck, .. } => assert_eq!(stuck, attempt >= 3),
                BackoffStep::GiveUp { .. } => panic!("gave up early"),
            }
        }
        assert_eq!(backoff.on_failure(), BackoffStep::GiveUp { attempts: 8 });
    }

    #[test]
    fn test_reset() {
        let mut backoff = Backoff::new(policy());
        backoff.on_failure();
        backoff.on_failure();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(!backoff.is_stuck());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
        assert_eq!(policy.max_attempts, 30);
        assert_eq!(policy.stuck_after_attempts, 5);
    }
}
