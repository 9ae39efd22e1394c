//! # Fieldgate Runtime
//!
//! The concurrency-safe pieces that sit around the rule engine on the
//! server side:
//!
//! - **RateLimiter**: per-client token buckets with idle reclamation
//! - **ResultCache**: bounded TTL cache for lookup outcomes
//! - **Sweeper**: owned background task for cache eviction and bucket reaping
//! - **ExternalLookup**: uniqueness/existence query contract
//! - **FieldValidationService**: admission, rules, cached lookup, verdict
//!
//! ## Example
//!
//! ```rust
//! use fieldgate_core::{FieldRules, FieldValidationRequest, FormRules, LookupCheck, Rule};
//! use fieldgate_runtime::{FieldValidationService, InMemoryLookup, RuntimeConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let rules = FormRules::new().field(
//!         "username",
//!         FieldRules::new().required().rule(Rule::AlphaNumeric).lookup(LookupCheck::Unique),
//!     );
//!     let lookup = Arc::new(InMemoryLookup::new().with_record("username", "admin", "1"));
//!     let service = FieldValidationService::new(RuntimeConfig::default(), rules, lookup);
//!
//!     let verdict = service
//!         .validate_field("127.0.0.1", "username", &FieldValidationRequest::new("admin"))
//!         .await
//!         .unwrap();
//!     assert!(!verdict.is_valid());
//! }
//! ```

pub mod cache;
pub mod config;
pub mod lookup;
pub mod metrics;
pub mod rate_limiter;
pub mod service;
pub mod sweeper;

pub use cache::{CacheKey, CacheStats, ResultCache};
pub use config::RuntimeConfig;
pub use lookup::{ExternalLookup, InMemoryLookup, LookupError, LookupQuery};
pub use metrics::{MetricsSnapshot, ValidationMetrics};
pub use rate_limiter::RateLimiter;
pub use service::{BatchVerdict, FieldValidationService, ServiceError, Verdict};
pub use sweeper::Sweeper;
