//! External lookup contract
//!
//! Uniqueness and existence checks live behind [`ExternalLookup`] so the
//! service can wrap them with caching, timeouts and rate limiting. The rule
//! engine itself never performs I/O.

use async_trait::async_trait;
use fieldgate_core::LookupCheck;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

/// One existence query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    pub field: String,
    pub value: String,
    pub check: LookupCheck,
    /// Record excluded from the match (the one being edited)
    pub exclude_id: Option<String>,
}

impl LookupQuery {
    pub fn new(field: impl Into<String>, value: impl Into<String>, check: LookupCheck) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            check,
            exclude_id: None,
        }
    }

    pub fn excluding(mut self, id: impl Into<String>) -> Self {
        self.exclude_id = Some(id.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup backend unavailable: {0}")]
    Unavailable(String),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("field '{0}' cannot be looked up")]
    UnsupportedField(String),
}

/// Answers "does a record with this value exist?"
#[async_trait]
pub trait ExternalLookup: Send + Sync {
    async fn exists(&self, query: &LookupQuery) -> Result<bool, LookupError>;

    /// Backend name for logs
    fn name(&self) -> &'static str {
        "lookup"
    }
}

/// In-memory lookup table, used when no database is configured.
///
/// Values are compared case-insensitively. Every call is counted.
#[derive(Debug, Default)]
pub struct InMemoryLookup {
    // field -> lowercased value -> record id
    records: RwLock<HashMap<String, HashMap<String, String>>>,
    calls: AtomicUsize,
}

impl InMemoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, field: &str, value: &str, id: &str) -> Self {
        self.insert(field, value, id);
        self
    }

    pub fn insert(&self, field: &str, value: &str, id: &str) {
        self.records
            .write()
            .entry(field.to_string())
            .or_default()
            .insert(value.to_lowercase(), id.to_string());
    }

    /// Number of `exists` calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalLookup for InMemoryLookup {
    async fn exists(&self, query: &LookupQuery) -> Result<bool, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let records = self.records.read();
        let found = records
            .get(&query.field)
            .and_then(|values| values.get(&query.value.to_lowercase()))
            .is_some_and(|id| query.exclude_id.as_deref() != Some(id.as_str()));

        Ok(found)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let lookup = InMemoryLookup::new()
            .with_record("username", "existinguser", "1")
            .with_record("email", "Taken@Example.com", "2");

        let query = LookupQuery::new("username", "existinguser", LookupCheck::Unique);
        assert!(lookup.exists(&query).await.unwrap());
        assert!(lookup
            .exists(&LookupQuery::new("email", "taken@example.com", LookupCheck::Unique))
            .await
            .unwrap());
        assert!(!lookup
            .exists(&LookupQuery::new("username", "newuser", LookupCheck::Unique))
            .await
            .unwrap());
        assert_eq!(lookup.calls(), 3);
    }

    #[tokio::test]
    async fn test_exclude_id_ignores_own_record() {
        let lookup = InMemoryLookup::new().with_record("email", "me@example.com", "42");

        let editing_self = LookupQuery::new("email", "me@example.com", LookupCheck::Unique).excluding("42");
        assert!(!lookup.exists(&editing_self).await.unwrap());

        let editing_other = LookupQuery::new("email", "me@example.com", LookupCheck::Unique).excluding("7");
        assert!(lookup.exists(&editing_other).await.unwrap());
    }
}
