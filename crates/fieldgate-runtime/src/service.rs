//! Field validation orchestration
//!
//! For one field the service runs: rate limit admission, then the field's
//! rule chain, then (only when the rules passed and a check applies) the
//! external lookup through the result cache. Pure rules are never cached;
//! lookup failures are reported as `validation_error` and never cached.

use fieldgate_core::{
    builtin_messages, codes, BatchValidationRequest, BatchValidationResponse, ErrorSet, FieldResult,
    FieldRules, FieldValidationRequest, FormRules, LookupCheck, LookupOutcome, MessageResolver, Related,
    Validator,
};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheKey, ResultCache};
use crate::config::RuntimeConfig;
use crate::lookup::{ExternalLookup, LookupError, LookupQuery};
use crate::metrics::{MetricsSnapshot, ValidationMetrics};
use crate::rate_limiter::RateLimiter;
use crate::sweeper::Sweeper;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no validation rules registered for field '{0}'")]
    UnknownField(String),
}

/// Terminal state of one field validation
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Admission denied; not a validation failure
    RateLimited,
    /// Lookup outcome served from the cache
    Cached(ErrorSet),
    Evaluated(ErrorSet),
}

impl Verdict {
    pub fn errors(&self) -> Option<&ErrorSet> {
        match self {
            Verdict::RateLimited => None,
            Verdict::Cached(errors) | Verdict::Evaluated(errors) => Some(errors),
        }
    }

    pub fn into_errors(self) -> Option<ErrorSet> {
        match self {
            Verdict::RateLimited => None,
            Verdict::Cached(errors) | Verdict::Evaluated(errors) => Some(errors),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors().is_some_and(ErrorSet::is_valid)
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Verdict::RateLimited)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchVerdict {
    RateLimited,
    Completed(BatchValidationResponse),
}

pub struct FieldValidationService {
    config: RuntimeConfig,
    rules: FormRules,
    limiter: Arc<RateLimiter>,
    cache: Arc<ResultCache<LookupOutcome>>,
    lookup: Arc<dyn ExternalLookup>,
    messages: Arc<dyn MessageResolver>,
    metrics: ValidationMetrics,
}

impl FieldValidationService {
    pub fn new(config: RuntimeConfig, rules: FormRules, lookup: Arc<dyn ExternalLookup>) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(config.rate_per_sec, config.burst)),
            cache: Arc::new(ResultCache::new(config.max_cache_entries)),
            config,
            rules,
            lookup,
            messages: builtin_messages(),
            metrics: ValidationMetrics::new(),
        }
    }

    /// Resolve error messages through `messages` instead of the built-in catalog
    pub fn with_messages(mut self, messages: Arc<dyn MessageResolver>) -> Self {
        self.messages = messages;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn rules(&self) -> &FormRules {
        &self.rules
    }

    pub fn cache(&self) -> &ResultCache<LookupOutcome> {
        &self.cache
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.cache.stats(), self.limiter.len())
    }

    /// Start the background task that evicts expired cache entries and
    /// reclaims idle limiter buckets. The caller owns its lifecycle.
    pub fn spawn_sweeper(&self) -> Sweeper {
        let cache = self.cache.clone();
        let limiter = self.limiter.clone();
        let idle = self.config.limiter_idle();

        Sweeper::spawn("validation", self.config.sweep_interval(), move || {
            let expired = cache.sweep();
            let reaped = limiter.reap_idle(idle);
            if expired > 0 || reaped > 0 {
                debug!(expired, reaped, "sweep complete");
            }
        })
    }

    /// Validate one field for `client_id`
    pub async fn validate_field(
        &self,
        client_id: &str,
        field: &str,
        request: &FieldValidationRequest,
    ) -> Result<Verdict, ServiceError> {
        let rules = self
            .rules
            .get(field)
            .ok_or_else(|| ServiceError::UnknownField(field.to_string()))?;

        self.metrics.record_request();
        if !self.admit(client_id) {
            return Ok(Verdict::RateLimited);
        }

        let locale = self.locale(request.locale.as_deref());
        let check = request.check.or(rules.lookup_check());
        let (errors, cached) = self
            .evaluate(
                field,
                rules,
                &request.value,
                &request.related,
                check,
                request.exclude_id.as_deref(),
                locale,
            )
            .await;

        debug!(field, client_id, valid = errors.is_valid(), cached, "field validated");

        Ok(if cached {
            Verdict::Cached(errors)
        } else {
            Verdict::Evaluated(errors)
        })
    }

    /// Validate several fields under a single admission. Every submitted
    /// value is visible to cross-field rules. Fields without rules are skipped.
    pub async fn validate_batch(&self, client_id: &str, request: &BatchValidationRequest) -> BatchVerdict {
        self.metrics.record_request();
        if !self.admit(client_id) {
            return BatchVerdict::RateLimited;
        }

        let locale = self.locale(request.locale.as_deref());
        let evaluations = request
            .fields
            .iter()
            .filter_map(|(name, value)| match self.rules.get(name) {
                Some(rules) => Some((name, value, rules)),
                None => {
                    debug!(field = %name, "no rules for batch field, skipped");
                    None
                }
            })
            .map(|(name, value, rules)| async move {
                let check = rules.lookup_check();
                let (errors, _) = self
                    .evaluate(name, rules, value, &request.fields, check, None, locale)
                    .await;
                (name.clone(), FieldResult::from(errors))
            });

        let results: BTreeMap<String, FieldResult> = join_all(evaluations).await.into_iter().collect();
        debug!(client_id, fields = results.len(), "batch validated");

        BatchVerdict::Completed(BatchValidationResponse::from_results(results))
    }

    fn admit(&self, client_id: &str) -> bool {
        if !self.config.enable_rate_limit || self.limiter.allow(client_id) {
            return true;
        }
        self.metrics.record_rate_limited();
        debug!(client_id, "rate limited");
        false
    }

    fn locale<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .filter(|locale| !locale.trim().is_empty())
            .unwrap_or(&self.config.default_locale)
    }

    #[allow(clippy::too_many_arguments)]
    async fn evaluate(
        &self,
        field: &str,
        rules: &FieldRules,
        value: &str,
        related: &Related,
        check: Option<LookupCheck>,
        exclude_id: Option<&str>,
        locale: &str,
    ) -> (ErrorSet, bool) {
        let validator = rules.apply(Validator::with_messages(locale, self.messages.clone()), field, value, related);

        let mut cached = false;
        let validator = match check {
            Some(check) if validator.is_valid() && !value.trim().is_empty() => {
                let (outcome, hit) = self.resolve_lookup(field, value, check, exclude_id).await;
                cached = hit;
                validator.lookup_outcome(field, &outcome)
            }
            _ => validator,
        };

        let errors = validator.into_errors();
        if errors.contains_code(codes::SECURITY_VIOLATION) {
            self.metrics.record_security_violation();
        }
        if cached {
            self.metrics.record_cached();
        }
        self.metrics.record_verdict(errors.is_valid());

        (errors, cached)
    }

    /// Lookup through the cache. Returns the outcome and whether it was a hit.
    async fn resolve_lookup(
        &self,
        field: &str,
        value: &str,
        check: LookupCheck,
        exclude_id: Option<&str>,
    ) -> (LookupOutcome, bool) {
        let key = CacheKey::new(&[field, value, check.as_str(), exclude_id.unwrap_or("")]);
        if self.config.enable_cache {
            if let Some(outcome) = self.cache.get(&key) {
                return (outcome, true);
            }
        }

        let mut query = LookupQuery::new(field, value, check);
        query.exclude_id = exclude_id.map(str::to_string);

        let timeout = self.config.lookup_timeout();
        let result = match tokio::time::timeout(timeout, self.lookup.exists(&query)).await {
            Ok(result) => result,
            Err(_) => Err(LookupError::Timeout(timeout)),
        };
        self.metrics.record_lookup(result.is_err());

        match result {
            Ok(exists) => {
                let outcome = LookupOutcome::from_exists(check, exists);
                if self.config.enable_cache {
                    self.cache.set(key, outcome.clone(), self.config.cache_ttl());
                }
                (outcome, false)
            }
            Err(err) => {
                warn!(field, backend = self.lookup.name(), error = %err, "lookup failed");
                (LookupOutcome::Failed(err.to_string()), false)
            }
        }
    }
}
