// File: src/error.rs
// Purpose: Validation error type and the ordered error collection produced by a rule chain

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable machine-readable error codes.
///
/// Messages are localized and may change; these never do.
pub mod codes {
    pub const REQUIRED: &str = "required";
    pub const MIN_LENGTH: &str = "min_length";
    pub const MAX_LENGTH: &str = "max_length";
    pub const LENGTH_RANGE: &str = "length_range";
    pub const INVALID_EMAIL: &str = "invalid_email";
    pub const INVALID_PHONE: &str = "invalid_phone";
    pub const INVALID_URL: &str = "invalid_url";
    pub const INVALID_NUMBER: &str = "invalid_number";
    pub const INVALID_INTEGER: &str = "invalid_integer";
    pub const INVALID_DATE: &str = "invalid_date";
    pub const INVALID_ALPHANUMERIC: &str = "invalid_alphanumeric";
    pub const INVALID_ALPHA: &str = "invalid_alpha";
    pub const INVALID_OPTION: &str = "invalid_option";
    pub const MIN_VALUE: &str = "min_value";
    pub const MAX_VALUE: &str = "max_value";
    pub const VALUE_RANGE: &str = "value_range";
    pub const PATTERN_MISMATCH: &str = "pattern_mismatch";
    pub const PASSWORD_WEAK: &str = "password_weak";
    pub const PASSWORD_MISMATCH: &str = "password_mismatch";
    pub const FIELDS_MISMATCH: &str = "fields_mismatch";
    pub const DATE_COMPARISON: &str = "date_comparison";
    pub const EMAIL_TAKEN: &str = "email_taken";
    pub const USERNAME_TAKEN: &str = "username_taken";
    pub const VALUE_TAKEN: &str = "value_taken";
    pub const RECORD_NOT_FOUND: &str = "record_not_found";
    pub const BUSINESS_RULE: &str = "business_rule";
    /// Lookup or infrastructure failure, not a user input failure
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const SECURITY_VIOLATION: &str = "security_violation";

    /// Every code the built-in message catalog must cover
    pub const ALL: &[&str] = &[
        REQUIRED,
        MIN_LENGTH,
        MAX_LENGTH,
        LENGTH_RANGE,
        INVALID_EMAIL,
        INVALID_PHONE,
        INVALID_URL,
        INVALID_NUMBER,
        INVALID_INTEGER,
        INVALID_DATE,
        INVALID_ALPHANUMERIC,
        INVALID_ALPHA,
        INVALID_OPTION,
        MIN_VALUE,
        MAX_VALUE,
        VALUE_RANGE,
        PATTERN_MISMATCH,
        PASSWORD_WEAK,
        PASSWORD_MISMATCH,
        FIELDS_MISMATCH,
        DATE_COMPARISON,
        EMAIL_TAKEN,
        USERNAME_TAKEN,
        VALUE_TAKEN,
        RECORD_NOT_FOUND,
        BUSINESS_RULE,
        VALIDATION_ERROR,
        SECURITY_VIOLATION,
    ];
}

/// A single validation failure for one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: String,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }

    /// True for failures caused by infrastructure rather than user input
    pub fn is_infrastructure(&self) -> bool {
        self.code == codes::VALIDATION_ERROR
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.code)
    }
}

/// Ordered collection of validation failures.
///
/// Insertion order is preserved (first detected, first reported) and a field
/// may appear more than once. The set is valid exactly when it is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorSet {
    errors: Vec<ValidationError>,
}

impl ErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error, returning the extended set
    #[must_use]
    pub fn with(mut self, error: ValidationError) -> Self {
        self.errors.push(error);
        self
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Append every error of `other`, keeping both orders
    pub fn extend(&mut self, other: ErrorSet) {
        self.errors.extend(other.errors);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.errors.iter()
    }

    pub fn has_errors_for_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Errors for one field, in detection order
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationError> + 'a {
        self.errors.iter().filter(move |e| e.field == field)
    }

    /// First message reported for a field; this is what the client displays
    pub fn first_message(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// First error overall
    pub fn first(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    pub fn codes(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.code.as_str()).collect()
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn as_slice(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.errors
    }
}

impl From<Vec<ValidationError>> for ErrorSet {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }
}

impl IntoIterator for ErrorSet {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorSet {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
