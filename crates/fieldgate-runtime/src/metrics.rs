// File: src/metrics.rs
// Purpose: Counters for validation traffic, exposed as a serializable snapshot

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::CacheStats;

#[derive(Debug, Default)]
pub struct ValidationMetrics {
    requests: AtomicU64,
    valid: AtomicU64,
    invalid: AtomicU64,
    cached: AtomicU64,
    rate_limited: AtomicU64,
    lookup_calls: AtomicU64,
    lookup_errors: AtomicU64,
    security_violations: AtomicU64,
}

impl ValidationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verdict(&self, valid: bool) {
        let counter = if valid { &self.valid } else { &self.invalid };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cached(&self) {
        self.cached.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup(&self, failed: bool) {
        self.lookup_calls.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.lookup_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_security_violation(&self) {
        self.security_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, cache: CacheStats, tracked_clients: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            valid: self.valid.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            cached: self.cached.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            lookup_calls: self.lookup_calls.load(Ordering::Relaxed),
            lookup_errors: self.lookup_errors.load(Ordering::Relaxed),
            security_violations: self.security_violations.load(Ordering::Relaxed),
            cache_hit_rate: cache.hit_rate(),
            cache,
            tracked_clients,
        }
    }
}

/// Point-in-time view served by the stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub valid: u64,
    pub invalid: u64,
    pub cached: u64,
    pub rate_limited: u64,
    pub lookup_calls: u64,
    pub lookup_errors: u64,
    pub security_violations: u64,
    pub cache: CacheStats,
    pub cache_hit_rate: f64,
    /// Clients with a live rate limiter bucket
    pub tracked_clients: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = ValidationMetrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_verdict(true);
        metrics.record_verdict(false);
        metrics.record_lookup(false);
        metrics.record_lookup(true);

        let stats = CacheStats {
            hits: 1,
            misses: 3,
            entries: 1,
        };
        let snapshot = metrics.snapshot(stats, 2);

        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.valid, 1);
        assert_eq!(snapshot.invalid, 1);
        assert_eq!(snapshot.lookup_calls, 2);
        assert_eq!(snapshot.lookup_errors, 1);
        assert_eq!(snapshot.cache_hit_rate, 0.25);
        assert_eq!(snapshot.tracked_clients, 2);
    }
}
