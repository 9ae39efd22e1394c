//! Rule engine
//!
//! [`Validator`] accumulates an [`ErrorSet`] by evaluating rules one at a
//! time. Every rule consumes the validator and hands it back, so a chain reads
//! top to bottom while ownership of the error state moves explicitly:
//!
//! ```
//! use fieldgate_core::Validator;
//!
//! let result = Validator::new("en")
//!     .required("name", "")
//!     .email("email", "bad")
//!     .min_length("password", "123", 8);
//!
//! assert_eq!(result.errors().codes(), vec!["required", "invalid_email", "min_length"]);
//! ```
//!
//! Format rules treat an empty (or whitespace-only) value as "not present"
//! and pass; absence is the job of [`Validator::required`].
//!
//! A validator is built per request and never shared between threads.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{codes, ErrorSet, ValidationError};
use crate::lookup::LookupOutcome;
use crate::messages::{humanize, keys, MessageCatalog, MessageResolver};
use crate::validators::{self, PasswordPolicy};

static BUILTIN_MESSAGES: Lazy<Arc<MessageCatalog>> = Lazy::new(|| Arc::new(MessageCatalog::builtin()));

/// The default message resolver shared by every validator that is not given one
pub fn builtin_messages() -> Arc<dyn MessageResolver> {
    BUILTIN_MESSAGES.clone()
}

pub struct Validator {
    errors: ErrorSet,
    locale: String,
    messages: Arc<dyn MessageResolver>,
    // Fields that tripped the content filter; later rules skip them
    quarantined: HashSet<String>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("locale", &self.locale)
            .field("errors", &self.errors)
            .finish()
    }
}

impl Validator {
    /// Validator using the built-in message catalog
    pub fn new(locale: impl Into<String>) -> Self {
        Self::with_messages(locale, builtin_messages())
    }

    /// Validator resolving messages through an injected resolver
    pub fn with_messages(locale: impl Into<String>, messages: Arc<dyn MessageResolver>) -> Self {
        Self {
            errors: ErrorSet::new(),
            locale: locale.into(),
            messages,
            quarantined: HashSet::new(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_valid()
    }

    pub fn errors(&self) -> &ErrorSet {
        &self.errors
    }

    pub fn has_errors_for_field(&self, field: &str) -> bool {
        self.errors.has_errors_for_field(field)
    }

    /// Finish the chain and take the accumulated errors
    pub fn into_errors(self) -> ErrorSet {
        self.errors
    }

    /// Field failed the content filter earlier in this chain
    pub fn is_quarantined(&self, field: &str) -> bool {
        self.quarantined.contains(field)
    }

    // ------------------------------------------------------------------
    // Presence and length
    // ------------------------------------------------------------------

    pub fn required(self, field: &str, value: &str) -> Self {
        if self.skips(field) || !is_blank(value) {
            return self;
        }
        self.fail(field, codes::REQUIRED, &[])
    }

    pub fn min_length(self, field: &str, value: &str, min: usize) -> Self {
        if self.skips(field) || is_blank(value) || validators::char_len(value) >= min {
            return self;
        }
        self.fail(field, codes::MIN_LENGTH, &[("min", min.to_string().as_str())])
    }

    pub fn max_length(self, field: &str, value: &str, max: usize) -> Self {
        if self.skips(field) || is_blank(value) || validators::char_len(value) <= max {
            return self;
        }
        self.fail(field, codes::MAX_LENGTH, &[("max", max.to_string().as_str())])
    }

    pub fn length_range(self, field: &str, value: &str, min: usize, max: usize) -> Self {
        let len = validators::char_len(value);
        if self.skips(field) || is_blank(value) || (min..=max).contains(&len) {
            return self;
        }
        self.fail(
            field,
            codes::LENGTH_RANGE,
            &[("min", min.to_string().as_str()), ("max", max.to_string().as_str())],
        )
    }

    // ------------------------------------------------------------------
    // Formats
    // ------------------------------------------------------------------

    pub fn email(self, field: &str, value: &str) -> Self {
        self.format_rule(field, value, codes::INVALID_EMAIL, validators::is_valid_email)
    }

    /// Punctuation is stripped before matching `+?[1-9]\d{1,14}`
    pub fn phone(self, field: &str, value: &str) -> Self {
        self.format_rule(field, value, codes::INVALID_PHONE, validators::is_valid_phone)
    }

    pub fn url(self, field: &str, value: &str) -> Self {
        self.format_rule(field, value, codes::INVALID_URL, validators::is_valid_url)
    }

    pub fn numeric(self, field: &str, value: &str) -> Self {
        self.format_rule(field, value, codes::INVALID_NUMBER, |v| parse_number(v).is_some())
    }

    pub fn integer(self, field: &str, value: &str) -> Self {
        self.format_rule(field, value, codes::INVALID_INTEGER, |v| v.trim().parse::<i64>().is_ok())
    }

    /// First matching entry of [`validators::DATE_FORMATS`] wins
    pub fn date(self, field: &str, value: &str) -> Self {
        self.format_rule(field, value, codes::INVALID_DATE, |v| validators::parse_date(v).is_some())
    }

    pub fn alpha(self, field: &str, value: &str) -> Self {
        self.format_rule(field, value, codes::INVALID_ALPHA, validators::is_alpha)
    }

    pub fn alpha_numeric(self, field: &str, value: &str) -> Self {
        self.format_rule(field, value, codes::INVALID_ALPHANUMERIC, validators::is_alphanumeric)
    }

    /// Caller-supplied pattern; `message` is reported verbatim when non-empty
    pub fn pattern(self, field: &str, value: &str, pattern: &Regex, message: &str) -> Self {
        if self.skips(field) || is_blank(value) || pattern.is_match(value) {
            return self;
        }
        if message.is_empty() {
            self.fail(field, codes::PATTERN_MISMATCH, &[])
        } else {
            self.push(field, codes::PATTERN_MISMATCH, message.to_string())
        }
    }

    pub fn one_of(self, field: &str, value: &str, allowed: &[&str]) -> Self {
        if self.skips(field) || is_blank(value) || allowed.contains(&value) {
            return self;
        }
        self.fail(field, codes::INVALID_OPTION, &[("options", allowed.join(", ").as_str())])
    }

    // ------------------------------------------------------------------
    // Numeric bounds
    // ------------------------------------------------------------------

    pub fn min_value(self, field: &str, value: &str, min: f64) -> Self {
        self.bounded(field, value, Some(min), None, codes::MIN_VALUE)
    }

    pub fn max_value(self, field: &str, value: &str, max: f64) -> Self {
        self.bounded(field, value, None, Some(max), codes::MAX_VALUE)
    }

    pub fn range(self, field: &str, value: &str, min: f64, max: f64) -> Self {
        self.bounded(field, value, Some(min), Some(max), codes::VALUE_RANGE)
    }

    // ------------------------------------------------------------------
    // Passwords and cross-field rules
    // ------------------------------------------------------------------

    pub fn password(self, field: &str, value: &str, policy: &PasswordPolicy) -> Self {
        if self.skips(field) || is_blank(value) {
            return self;
        }
        match policy.check(value) {
            Ok(()) => self,
            Err(requirement) => {
                let min = policy.min_length.to_string();
                let reason = self
                    .messages
                    .resolve(requirement.message_key(), &self.locale, &[("min", min.as_str())]);
                self.fail(field, codes::PASSWORD_WEAK, &[("reason", reason.as_str())])
            }
        }
    }

    /// The mismatch is reported on the confirmation field
    pub fn password_confirmation(self, password: &str, confirmation_field: &str, confirmation: &str) -> Self {
        if self.skips(confirmation_field) || is_blank(confirmation) || password == confirmation {
            return self;
        }
        self.fail(confirmation_field, codes::PASSWORD_MISMATCH, &[])
    }

    /// Equality between two fields; the mismatch is attached to `other_field`
    pub fn fields_match(self, field: &str, value: &str, other_field: &str, other_value: &str) -> Self {
        if self.skips(other_field) || is_blank(other_value) || value == other_value {
            return self;
        }
        self.fail(other_field, codes::FIELDS_MISMATCH, &[("other", humanize(field).as_str())])
    }

    /// `value` must be strictly later than `other_value`.
    ///
    /// Either side failing to parse skips the comparison; the `date` rule owns
    /// reporting unparsable input.
    pub fn date_after(self, field: &str, value: &str, other_field: &str, other_value: &str) -> Self {
        self.date_order(field, value, other_field, other_value, true)
    }

    /// `value` must be strictly earlier than `other_value`
    pub fn date_before(self, field: &str, value: &str, other_field: &str, other_value: &str) -> Self {
        self.date_order(field, value, other_field, other_value, false)
    }

    // ------------------------------------------------------------------
    // Escape hatches
    // ------------------------------------------------------------------

    /// Generic business rule; the closure reports `(ok, message)`.
    ///
    /// An empty message falls back to the catalog's `business_rule` text.
    pub fn business_rule<F>(self, field: &str, predicate: F) -> Self
    where
        F: FnOnce() -> (bool, String),
    {
        if self.skips(field) {
            return self;
        }
        match predicate() {
            (true, _) => self,
            (false, message) if message.is_empty() => self.fail(field, codes::BUSINESS_RULE, &[]),
            (false, message) => self.push(field, codes::BUSINESS_RULE, message),
        }
    }

    /// Content filter. A trip quarantines the field: every later rule for it
    /// in this chain is skipped, and the event goes to the audit log.
    pub fn security(mut self, field: &str, value: &str) -> Self {
        if self.skips(field) {
            return self;
        }
        match validators::detect_injection(value) {
            None => self,
            Some(kind) => {
                tracing::warn!(
                    target: "fieldgate::audit",
                    field = field,
                    kind = kind.as_str(),
                    "content filter tripped"
                );
                self.quarantined.insert(field.to_string());
                self.fail(field, codes::SECURITY_VIOLATION, &[])
            }
        }
    }

    /// Fold the outcome of an external lookup into the error set
    pub fn lookup_outcome(self, field: &str, outcome: &LookupOutcome) -> Self {
        if self.skips(field) {
            return self;
        }
        match outcome {
            LookupOutcome::Passed => self,
            LookupOutcome::Taken => {
                let code = match field {
                    "email" => codes::EMAIL_TAKEN,
                    "username" => codes::USERNAME_TAKEN,
                    _ => codes::VALUE_TAKEN,
                };
                self.fail(field, code, &[])
            }
            LookupOutcome::NotFound => self.fail(field, codes::RECORD_NOT_FOUND, &[]),
            LookupOutcome::Failed(_) => self.fail(field, codes::VALIDATION_ERROR, &[]),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn skips(&self, field: &str) -> bool {
        self.quarantined.contains(field)
    }

    fn format_rule(self, field: &str, value: &str, code: &str, is_ok: impl Fn(&str) -> bool) -> Self {
        if self.skips(field) || is_blank(value) || is_ok(value) {
            return self;
        }
        self.fail(field, code, &[])
    }

    fn bounded(self, field: &str, value: &str, min: Option<f64>, max: Option<f64>, code: &str) -> Self {
        if self.skips(field) || is_blank(value) {
            return self;
        }
        let Some(number) = parse_number(value) else {
            return self.fail(field, codes::INVALID_NUMBER, &[]);
        };

        let below = min.is_some_and(|m| number < m);
        let above = max.is_some_and(|m| number > m);
        if !below && !above {
            return self;
        }

        let min_text = min.map(format_number).unwrap_or_default();
        let max_text = max.map(format_number).unwrap_or_default();
        self.fail(field, code, &[("min", min_text.as_str()), ("max", max_text.as_str())])
    }

    fn date_order(self, field: &str, value: &str, other_field: &str, other_value: &str, after: bool) -> Self {
        if self.skips(field) {
            return self;
        }
        let (Some(date), Some(other)) = (validators::parse_date(value), validators::parse_date(other_value)) else {
            return self;
        };

        let ordered = if after { date > other } else { date < other };
        if ordered {
            return self;
        }

        let key = if after { keys::DATE_AFTER } else { keys::DATE_BEFORE };
        self.fail_with_template(
            field,
            codes::DATE_COMPARISON,
            key,
            &[("other", humanize(other_field).as_str())],
        )
    }

    fn fail(self, field: &str, code: &str, extra: &[(&str, &str)]) -> Self {
        self.fail_with_template(field, code, code, extra)
    }

    /// Report `code` with the message resolved from `template_key`
    fn fail_with_template(self, field: &str, code: &str, template_key: &str, extra: &[(&str, &str)]) -> Self {
        let label = humanize(field);
        let mut args: Vec<(&str, &str)> = Vec::with_capacity(extra.len() + 1);
        args.push(("field", label.as_str()));
        args.extend_from_slice(extra);

        let message = self.messages.resolve(template_key, &self.locale, &args);
        self.push(field, code, message)
    }

    fn push(mut self, field: &str, code: &str, message: String) -> Self {
        self.errors.push(ValidationError::new(field, code, message));
        self
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Format number nicely (remove .0 for integers)
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
