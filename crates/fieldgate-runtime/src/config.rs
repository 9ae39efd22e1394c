// File: src/config.rs
// Purpose: Tunables for the rate limiter, result cache, sweeper and lookups

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime configuration, the `[runtime]` table of fieldgate.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Tokens added to each client bucket per second
    #[serde(default = "default_rate_per_sec")]
    pub rate_per_sec: f64,

    /// Bucket capacity (requests allowed in a burst)
    #[serde(default = "default_burst")]
    pub burst: u32,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// How often the background sweeper runs
    #[serde(default = "default_cache_sweep_secs")]
    pub cache_sweep_secs: u64,

    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,

    /// Full buckets untouched for this long are reclaimed
    #[serde(default = "default_limiter_idle_secs")]
    pub limiter_idle_secs: u64,

    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,

    #[serde(default = "default_true")]
    pub enable_rate_limit: bool,

    #[serde(default = "default_true")]
    pub enable_cache: bool,

    #[serde(default = "default_locale")]
    pub default_locale: String,
}

fn default_rate_per_sec() -> f64 {
    5.0
}

fn default_burst() -> u32 {
    10
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_sweep_secs() -> u64 {
    300
}

fn default_max_cache_entries() -> usize {
    10_000
}

fn default_limiter_idle_secs() -> u64 {
    600
}

fn default_lookup_timeout_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

fn default_locale() -> String {
    "en".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: default_rate_per_sec(),
            burst: default_burst(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_sweep_secs: default_cache_sweep_secs(),
            max_cache_entries: default_max_cache_entries(),
            limiter_idle_secs: default_limiter_idle_secs(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            enable_rate_limit: true,
            enable_cache: true,
            default_locale: default_locale(),
        }
    }
}

impl RuntimeConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Never zero; tokio intervals reject a zero period
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_secs.max(1))
    }

    pub fn limiter_idle(&self) -> Duration {
        Duration::from_secs(self.limiter_idle_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}
