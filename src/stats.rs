//! Loader statistics.
//!
//! Cheap atomic counters incremented by worker jobs, snapshot on demand for
//! monitoring.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by all jobs of one engine.
#[derive(Debug, Default)]
pub struct LoaderStats {
    cache_hits: AtomicU64,
    fetches: AtomicU64,
    stale_served: AtomicU64,
    failures: AtomicU64,
    canceled: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Fresh cache entries served without touching the network.
    pub cache_hits: u64,
    /// Successful network fetches (including 304 revalidations).
    pub fetches: u64,
    /// Stale entries served because the fetch failed.
    pub stale_served: u64,
    /// Jobs that finished as FAILURE.
    pub failures: u64,
    /// Jobs canceled while still queued.
    pub canceled: u64,
}

impl StatsSnapshot {
    /// Fraction of completed jobs answered from cache without a fetch.
    /// Returns 0.0 when nothing completed yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.fetches + self.stale_served + self.failures;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl LoaderStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_served(&self) {
        self.stale_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_canceled(&self) {
        self.canceled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            canceled: self.canceled.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = LoaderStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_records_accumulate() {
        let stats = LoaderStats::new();
        stats.record_cache_hit();
        stats.record_cache_hit();
        stats.record_fetch();
        stats.record_stale_served();
        stats.record_failure();
        stats.record_canceled();

        let snap = stats.snapshot();
        assert_eq!(snap.cache_hits, 2);
        assert_eq!(snap.fetches, 1);
        assert_eq!(snap.stale_served, 1);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.canceled, 1);
    }

    #[test]
    fn test_hit_rate() {
        let stats = LoaderStats::new();
        assert_eq!(stats.snapshot().hit_rate(), 0.0);

        stats.record_cache_hit();
        stats.record_fetch();
        stats.record_fetch();
        stats.record_fetch();
        assert!((stats.snapshot().hit_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_canceled_jobs_do_not_skew_hit_rate() {
        let stats = LoaderStats::new();
        stats.record_cache_hit();
        stats.record_canceled();
        stats.record_canceled();
        assert!((stats.snapshot().hit_rate() - 1.0).abs() < f64::EPSILON);
    }
}
