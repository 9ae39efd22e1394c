// File: src/wire.rs
// Purpose: Request and response bodies of the field and batch validation endpoints

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::ErrorSet;
use crate::lookup::LookupCheck;

/// Body of `POST /api/validate/:field`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValidationRequest {
    #[serde(default)]
    pub value: String,
    /// Other field values needed by cross-field rules
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub related: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<LookupCheck>,
    /// Record to ignore in uniqueness checks (edit forms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl FieldValidationRequest {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_related(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.related.insert(name.into(), value.into());
        self
    }
}

/// Verdict for one field.
///
/// Valid responses carry only `valid` and `field`. Invalid ones add the first
/// message (what a form displays) and the full error list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValidationResponse {
    pub valid: bool,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "ErrorSet::is_empty")]
    pub errors: ErrorSet,
}

impl FieldValidationResponse {
    pub fn from_errors(field: impl Into<String>, errors: ErrorSet) -> Self {
        Self {
            valid: errors.is_valid(),
            field: field.into(),
            error: errors.first().map(|e| e.message.clone()),
            errors,
        }
    }
}

/// Body of `POST /api/validate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchValidationRequest {
    pub fields: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResult {
    pub valid: bool,
    #[serde(default)]
    pub errors: ErrorSet,
}

impl From<ErrorSet> for FieldResult {
    fn from(errors: ErrorSet) -> Self {
        Self {
            valid: errors.is_valid(),
            errors,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchValidationResponse {
    pub valid: bool,
    pub results: BTreeMap<String, FieldResult>,
}

impl BatchValidationResponse {
    pub fn from_results(results: BTreeMap<String, FieldResult>) -> Self {
        Self {
            valid: results.values().all(|r| r.valid),
            results,
        }
    }
}
