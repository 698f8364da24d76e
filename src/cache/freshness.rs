//! Freshness evaluation for cached entries.
//!
//! Decides, from attributes and the current time alone, whether a cached
//! entry may be served without contacting the origin. Pure functions so the
//! policy is unit-testable without a cache, a clock or a network.

use serde::{Deserialize, Serialize};

use crate::cache::entry::CacheAttributes;

const DAY_MS: u64 = 24 * 3600 * 1000;

/// Default lifetime when the server supplied no expiry.
pub const DEFAULT_EXPIRE_TIME_MS: u64 = 7 * DAY_MS;
/// Limit for the max-age value sent by the server. Some servers send a
/// value that is far too large.
pub const EXPIRE_TIME_SERVER_LIMIT_MS: u64 = 28 * DAY_MS;
/// Absolute expire limit. Entries older than this are not revalidated with
/// If-Modified-Since, even if the refresh from the server fails.
pub const ABSOLUTE_EXPIRE_TIME_LIMIT_MS: u64 = 365 * DAY_MS;

/// Freshness policy constants, overridable by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessPolicy {
    /// Lifetime applied when the server declared no expiry.
    #[serde(default = "default_expire_ms")]
    pub default_expire_ms: u64,
    /// Cap applied to server-declared expiry values.
    #[serde(default = "default_server_limit_ms")]
    pub server_expiry_limit_ms: u64,
    /// Age beyond which conditional revalidation headers are not sent.
    #[serde(default = "default_absolute_limit_ms")]
    pub absolute_expire_limit_ms: u64,
}

fn default_expire_ms() -> u64 {
    DEFAULT_EXPIRE_TIME_MS
}

fn default_server_limit_ms() -> u64 {
    EXPIRE_TIME_SERVER_LIMIT_MS
}

fn default_absolute_limit_ms() -> u64 {
    ABSOLUTE_EXPIRE_TIME_LIMIT_MS
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            default_expire_ms: default_expire_ms(),
            server_expiry_limit_ms: default_server_limit_ms(),
            absolute_expire_limit_ms: default_absolute_limit_ms(),
        }
    }
}

impl FreshnessPolicy {
    /// Whether a cached entry may still be served, evaluated in order:
    ///
    /// 1. Server declared an expiry: cap it at
    ///    `create_time + max(server_expiry_limit, minimum_expiry)` and
    ///    compare against `now`.
    /// 2. Otherwise, if a fetch time is recorded, compare the age since the
    ///    last fetch against `max(default_expire, minimum_expiry)`.
    /// 3. Otherwise compare the age since first population against the same
    ///    limit.
    pub fn is_fresh(&self, attributes: &CacheAttributes, now: u64, minimum_expiry_ms: u64) -> bool {
        if attributes.expiration_time != 0 {
            let cap = attributes
                .create_time
                .saturating_add(self.server_expiry_limit_ms.max(minimum_expiry_ms));
            return now <= attributes.expiration_time.min(cap);
        }

        let max_age = self.default_expire_ms.max(minimum_expiry_ms);
        if attributes.last_modification > 0 {
            return now.saturating_sub(attributes.last_modification) <= max_age;
        }

        now.saturating_sub(attributes.create_time) <= max_age
    }

    /// Whether a conditional `If-Modified-Since` header may be sent for this
    /// entry. Never send one for data older than the absolute limit.
    pub fn may_revalidate(&self, attributes: &CacheAttributes, now: u64) -> bool {
        now.saturating_sub(attributes.last_modification) <= self.absolute_expire_limit_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const NOW: u64 = 1_700_000_000_000;
    const HOUR: u64 = 3600 * 1000;

    fn attrs(create: u64, last_mod: u64, expires: u64) -> CacheAttributes {
        CacheAttributes {
            create_time: create,
            last_modification: last_mod,
            expiration_time: expires,
            ..CacheAttributes::default()
        }
    }

    #[test]
    fn test_fresh_while_before_server_expiry() {
        let policy = FreshnessPolicy::default();
        let a = attrs(NOW - HOUR, NOW - HOUR, NOW + HOUR);
        assert!(policy.is_fresh(&a, NOW, 0));
    }

    #[test]
    fn test_stale_after_server_expiry() {
        let policy = FreshnessPolicy::default();
        let a = attrs(NOW - 2 * HOUR, NOW - 2 * HOUR, NOW - HOUR);
        assert!(!policy.is_fresh(&a, NOW, 0));
    }

    #[test]
    fn test_server_expiry_is_capped() {
        // Server claims a 10-year lifetime; the effective expiry must never
        // exceed create_time + server_expiry_limit.
        let policy = FreshnessPolicy::default();
        let create = NOW - 29 * 24 * HOUR;
        let a = attrs(create, create, NOW + 10 * 365 * 24 * HOUR);
        assert!(!policy.is_fresh(&a, NOW, 0));

        // Just inside the cap it is still fresh.
        let create = NOW - 27 * 24 * HOUR;
        let a = attrs(create, create, NOW + 10 * 365 * 24 * HOUR);
        assert!(policy.is_fresh(&a, NOW, 0));
    }

    #[test]
    fn test_minimum_expiry_raises_the_cap() {
        let policy = FreshnessPolicy::default();
        let create = NOW - 29 * 24 * HOUR;
        let a = attrs(create, create, NOW + 365 * 24 * HOUR);
        // 29 days old, beyond the 28-day server cap...
        assert!(!policy.is_fresh(&a, NOW, 0));
        // ...but a 30-day minimum expiry keeps it fresh.
        assert!(policy.is_fresh(&a, NOW, 30 * 24 * HOUR));
    }

    #[rstest]
    #[case(6, true)]
    #[case(8, false)]
    fn test_age_fallback_uses_last_fetch_time(#[case] days_old: u64, #[case] fresh: bool) {
        let policy = FreshnessPolicy::default();
        let a = attrs(NOW - 30 * 24 * HOUR, NOW - days_old * 24 * HOUR, 0);
        assert_eq!(policy.is_fresh(&a, NOW, 0), fresh);
    }

    #[rstest]
    #[case(6, true)]
    #[case(8, false)]
    fn test_age_fallback_uses_create_time_last(#[case] days_old: u64, #[case] fresh: bool) {
        let policy = FreshnessPolicy::default();
        let a = attrs(NOW - days_old * 24 * HOUR, 0, 0);
        assert_eq!(policy.is_fresh(&a, NOW, 0), fresh);
    }

    #[test]
    fn test_is_fresh_is_deterministic() {
        let policy = FreshnessPolicy::default();
        let a = attrs(NOW - HOUR, NOW - HOUR, NOW + HOUR);
        let first = policy.is_fresh(&a, NOW, 0);
        for _ in 0..10 {
            assert_eq!(policy.is_fresh(&a, NOW, 0), first);
        }
    }

    #[test]
    fn test_revalidation_gated_by_absolute_limit() {
        let policy = FreshnessPolicy::default();
        let recent = attrs(0, NOW - 100 * 24 * HOUR, 0);
        assert!(policy.may_revalidate(&recent, NOW));

        let ancient = attrs(0, NOW - 366 * 24 * HOUR, 0);
        assert!(!policy.may_revalidate(&ancient, NOW));
    }

    #[test]
    fn test_policy_deserializes_with_defaults() {
        let policy: FreshnessPolicy = serde_yaml::from_str("{}").unwrap();
        assert_eq!(policy.default_expire_ms, DEFAULT_EXPIRE_TIME_MS);
        assert_eq!(policy.server_expiry_limit_ms, EXPIRE_TIME_SERVER_LIMIT_MS);
        assert_eq!(
            policy.absolute_expire_limit_ms,
            ABSOLUTE_EXPIRE_TIME_LIMIT_MS
        );
    }
}
