//! Per-client token bucket rate limiting
//!
//! One bucket per client identifier, created full on first use. Admission is
//! non-blocking: [`RateLimiter::allow`] answers immediately and the caller
//! decides how to react (the server answers 429).
//!
//! Locking is two-level. The map lock is only taken for writing when a new
//! bucket has to be created (read, then write-lock and re-check). Each bucket
//! carries its own mutex for the refill-and-decrement step, so requests from
//! different clients never contend on the same lock.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Slack for refill arithmetic. `Duration` truncates `1/rate` to whole
/// nanoseconds, so a wait of exactly one token period can refill a hair
/// under one token.
const TOKEN_EPSILON: f64 = 1e-6;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    fn refill(&mut self, now: Instant, rate: f64, capacity: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

/// Token bucket limiter keyed by client identifier
#[derive(Debug)]
pub struct RateLimiter {
    buckets: RwLock<HashMap<String, Arc<Mutex<Bucket>>>>,
    rate: f64,
    capacity: f64,
}

impl RateLimiter {
    /// `rate` tokens per second, `burst` tokens of capacity
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            rate: rate.max(0.0),
            capacity: f64::from(burst),
        }
    }

    /// Take one token for `id` if available
    pub fn allow(&self, id: &str) -> bool {
        self.allow_at(id, Instant::now())
    }

    /// [`allow`](Self::allow) against an explicit clock reading
    pub fn allow_at(&self, id: &str, now: Instant) -> bool {
        let bucket = self.bucket(id, now);
        let mut bucket = bucket.lock();

        bucket.refill(now, self.rate, self.capacity);
        bucket.last_seen = now;

        if bucket.tokens + TOKEN_EPSILON >= 1.0 {
            bucket.tokens = (bucket.tokens - 1.0).max(0.0);
            true
        } else {
            false
        }
    }

    fn bucket(&self, id: &str, now: Instant) -> Arc<Mutex<Bucket>> {
        if let Some(bucket) = self.buckets.read().get(id) {
            return bucket.clone();
        }

        // Another request may have created it between the two locks
        let mut buckets = self.buckets.write();
        buckets
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Bucket::full(self.capacity, now))))
            .clone()
    }

    /// Drop buckets that are back at full capacity and have been idle for
    /// at least `idle_for`. Returns how many were removed.
    ///
    /// A removed bucket is indistinguishable from a fresh one, so reaping
    /// never changes an admission decision.
    pub fn reap_idle(&self, idle_for: Duration) -> usize {
        self.reap_idle_at(idle_for, Instant::now())
    }

    pub fn reap_idle_at(&self, idle_for: Duration, now: Instant) -> usize {
        let mut buckets = self.buckets.write();
        let before = buckets.len();

        buckets.retain(|_, bucket| {
            let mut bucket = bucket.lock();
            bucket.refill(now, self.rate, self.capacity);
            let idle = now.saturating_duration_since(bucket.last_seen) >= idle_for;
            !(idle && bucket.tokens + TOKEN_EPSILON >= self.capacity)
        });

        before - buckets.len()
    }

    /// Tokens currently available to `id`, if it has a bucket
    pub fn available(&self, id: &str) -> Option<f64> {
        let bucket = self.buckets.read().get(id).cloned()?;
        let mut bucket = bucket.lock();
        bucket.refill(Instant::now(), self.rate, self.capacity);
        Some(bucket.tokens)
    }

    /// Number of tracked clients
    pub fn len(&self) -> usize {
        self.buckets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.read().is_empty()
    }
}
