//! Retry logic for transient origin failures.
//!
//! A 503 Service Unavailable is the one status worth waiting out: the origin
//! is alive but overloaded, and tile servers routinely shed load this way.
//! Everything else either succeeded, is a permanent client error, or is
//! handled by the stale-fallback path.
//!
//! ## Backoff
//!
//! Each retry waits a fixed base delay plus a random jitter so a burst of
//! jobs hitting the same overloaded host does not retry in lockstep:
//! - base 5s + 0-5s jitter between attempts
//! - at most 5 attempts total
//!
//! Both knobs are configurable, which also keeps test runs fast.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for 503 responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial one).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed part of the delay before each retry, in milliseconds.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Upper bound of the random jitter added to each delay, in milliseconds.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_backoff_ms() -> u64 {
    5000
}

fn default_jitter_ms() -> u64 {
    5000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl RetryPolicy {
    /// Check if an HTTP status code should be retried.
    pub fn is_retriable_status(&self, status_code: u16) -> bool {
        status_code == 503
    }

    /// Check if another attempt may be made after `attempt` (0-indexed)
    /// finished with `status_code`.
    pub fn should_retry(&self, attempt: u32, status_code: u16) -> bool {
        if attempt + 1 >= self.max_attempts {
            return false;
        }
        self.is_retriable_status(status_code)
    }

    /// Delay before the next attempt: base plus random jitter.
    pub fn backoff_duration(&self) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..self.jitter_ms)
        };
        Duration::from_millis(self.base_backoff_ms.saturating_add(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_backoff_ms, 5000);
        assert_eq!(policy.jitter_ms, 5000);
    }

    #[test]
    fn test_only_503_is_retriable() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retriable_status(503), "503 should be retriable");

        for status in [200, 204, 304, 400, 403, 404, 500, 502, 504] {
            assert!(
                !policy.is_retriable_status(status),
                "{} should not be retriable",
                status
            );
        }
    }

    #[test]
    fn test_retry_budget_is_exhausted_after_max_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0, 503));
        assert!(policy.should_retry(3, 503));
        // Attempt 4 is the fifth and last one.
        assert!(!policy.should_retry(4, 503));
        assert!(!policy.should_retry(100, 503));
    }

    #[test]
    fn test_no_retry_for_success_or_permanent_errors() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(0, 200));
        assert!(!policy.should_retry(0, 404));
        assert!(!policy.should_retry(0, 500));
    }

    #[test]
    fn test_backoff_stays_within_base_plus_jitter() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_backoff_ms: 100,
            jitter_ms: 50,
        };
        for _ in 0..50 {
            let d = policy.backoff_duration();
            assert!(d >= Duration::from_millis(100));
            assert!(d < Duration::from_millis(150));
        }
    }

    #[test]
    fn test_zero_jitter_gives_fixed_backoff() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_backoff_ms: 250,
            jitter_ms: 0,
        };
        assert_eq!(policy.backoff_duration(), Duration::from_millis(250));
    }

    #[test]
    fn test_policy_deserializes_with_defaults() {
        let policy: RetryPolicy = serde_yaml::from_str("{}").unwrap();
        assert_eq!(policy, RetryPolicy::default());

        let policy: RetryPolicy = serde_yaml::from_str("max_attempts: 2\nbase_backoff_ms: 10\n").unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.base_backoff_ms, 10);
        assert_eq!(policy.jitter_ms, 5000);
    }
}
