// File: src/ruleset.rs
// Purpose: Declarative per-field rule lists, applied through the rule engine

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::engine::Validator;
use crate::error::ErrorSet;
use crate::lookup::LookupCheck;
use crate::validators::PasswordPolicy;

/// Values of the other fields submitted alongside the one being validated
pub type Related = HashMap<String, String>;

type BusinessFn = dyn Fn(&str, &Related) -> (bool, String) + Send + Sync;

/// Closure-backed business rule: receives the value and the related fields
#[derive(Clone)]
pub struct BusinessRule(Arc<BusinessFn>);

impl BusinessRule {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &Related) -> (bool, String) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for BusinessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BusinessRule(..)")
    }
}

/// One rule in a field's chain
#[derive(Debug, Clone)]
pub enum Rule {
    /// Content filter; put it first so a trip skips the rest of the chain
    Security,
    Required,
    MinLength(usize),
    MaxLength(usize),
    LengthRange(usize, usize),
    Email,
    Phone,
    Url,
    Numeric,
    Integer,
    Date,
    Alpha,
    AlphaNumeric,
    MinValue(f64),
    MaxValue(f64),
    Range(f64, f64),
    Pattern { regex: Regex, message: String },
    OneOf(Vec<String>),
    Password(PasswordPolicy),
    /// This field confirms the password held in the named field
    PasswordConfirmation(String),
    /// This field must equal the named field; the mismatch lands on this field
    Matches(String),
    /// Date strictly after the date in the named field
    After(String),
    /// Date strictly before the date in the named field
    Before(String),
    Business(BusinessRule),
}

/// Ordered rules for one field plus the lookup it needs, if any
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    rules: Vec<Rule>,
    lookup: Option<LookupCheck>,
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn required(self) -> Self {
        self.rule(Rule::Required)
    }

    pub fn security(self) -> Self {
        self.rule(Rule::Security)
    }

    /// Attach an external lookup; it only runs once every rule has passed
    pub fn lookup(mut self, check: LookupCheck) -> Self {
        self.lookup = Some(check);
        self
    }

    pub fn business<F>(self, f: F) -> Self
    where
        F: Fn(&str, &Related) -> (bool, String) + Send + Sync + 'static,
    {
        self.rule(Rule::Business(BusinessRule::new(f)))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn lookup_check(&self) -> Option<LookupCheck> {
        self.lookup
    }

    pub fn is_required(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, Rule::Required))
    }

    /// Run the chain for `field` against `validator` and hand it back
    pub fn apply(&self, validator: Validator, field: &str, value: &str, related: &Related) -> Validator {
        self.rules.iter().fold(validator, |v, rule| match rule {
            Rule::Security => v.security(field, value),
            Rule::Required => v.required(field, value),
            Rule::MinLength(min) => v.min_length(field, value, *min),
            Rule::MaxLength(max) => v.max_length(field, value, *max),
            Rule::LengthRange(min, max) => v.length_range(field, value, *min, *max),
            Rule::Email => v.email(field, value),
            Rule::Phone => v.phone(field, value),
            Rule::Url => v.url(field, value),
            Rule::Numeric => v.numeric(field, value),
            Rule::Integer => v.integer(field, value),
            Rule::Date => v.date(field, value),
            Rule::Alpha => v.alpha(field, value),
            Rule::AlphaNumeric => v.alpha_numeric(field, value),
            Rule::MinValue(min) => v.min_value(field, value, *min),
            Rule::MaxValue(max) => v.max_value(field, value, *max),
            Rule::Range(min, max) => v.range(field, value, *min, *max),
            Rule::Pattern { regex, message } => v.pattern(field, value, regex, message),
            Rule::OneOf(allowed) => {
                let allowed: Vec<&str> = allowed.iter().map(String::as_str).collect();
                v.one_of(field, value, &allowed)
            }
            Rule::Password(policy) => v.password(field, value, policy),
            Rule::PasswordConfirmation(password_field) => {
                v.password_confirmation(related_value(related, password_field), field, value)
            }
            Rule::Matches(other_field) => v.fields_match(other_field, related_value(related, other_field), field, value),
            Rule::After(other_field) => v.date_after(field, value, other_field, related_value(related, other_field)),
            Rule::Before(other_field) => v.date_before(field, value, other_field, related_value(related, other_field)),
            Rule::Business(rule) => v.business_rule(field, || (rule.0)(value, related)),
        })
    }
}

fn related_value<'a>(related: &'a Related, name: &str) -> &'a str {
    related.get(name).map(String::as_str).unwrap_or("")
}

/// Rule sets for every field of a form, kept in registration order
#[derive(Debug, Clone, Default)]
pub struct FormRules {
    fields: HashMap<String, FieldRules>,
    order: Vec<String>,
}

impl FormRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the rules for a field
    pub fn field(mut self, name: impl Into<String>, rules: FieldRules) -> Self {
        let name = name.into();
        if !self.fields.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.fields.insert(name, rules);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldRules> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Evaluate every registered field's pure rules. Lookups are not run here.
    ///
    /// Missing values are treated as empty strings.
    pub fn check_all(&self, mut validator: Validator, values: &Related) -> ErrorSet {
        for name in &self.order {
            let value = related_value(values, name);
            if let Some(rules) = self.fields.get(name) {
                validator = rules.apply(validator, name, value, values);
            }
        }
        validator.into_errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn related(pairs: &[(&str, &str)]) -> Related {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_apply_runs_rules_in_order() {
        let rules = FieldRules::new().required().rule(Rule::MinLength(3)).rule(Rule::AlphaNumeric);
        let v = rules.apply(Validator::new("en"), "username", "a!", &Related::new());
        assert_eq!(v.errors().codes(), vec!["min_length", "invalid_alphanumeric"]);
    }

    #[test]
    fn test_cross_field_rules_read_related() {
        let values = related(&[("password", "Secret123"), ("start_date", "2024-05-01")]);

        let confirm = FieldRules::new().rule(Rule::PasswordConfirmation("password".into()));
        let v = confirm.apply(Validator::new("en"), "password_confirmation", "Secret124", &values);
        assert_eq!(v.errors().codes(), vec!["password_mismatch"]);

        let end = FieldRules::new().rule(Rule::Date).rule(Rule::After("start_date".into()));
        let v = end.apply(Validator::new("en"), "end_date", "2024-04-01", &values);
        let err = v.errors().first().unwrap();
        assert_eq!(err.code, "date_comparison");
        assert_eq!(err.field, "end_date");
        assert_eq!(err.message, "End date must be after Start date");
    }

    #[test]
    fn test_matches_attaches_error_to_own_field() {
        let values = related(&[("email", "a@example.com")]);
        let rules = FieldRules::new().rule(Rule::Matches("email".into()));
        let v = rules.apply(Validator::new("en"), "email_confirmation", "b@example.com", &values);

        assert_eq!(v.errors().first().unwrap().field, "email_confirmation");
        assert_eq!(v.errors().codes(), vec!["fields_mismatch"]);
    }

    #[test]
    fn test_business_rule_sees_related_values() {
        let rules = FieldRules::new().business(|value, related| {
            let country = related.get("country").map(String::as_str).unwrap_or("");
            (country != "US" || value.len() == 5, "ZIP codes have 5 digits".to_string())
        });

        let v = rules.apply(Validator::new("en"), "zip", "1234", &related(&[("country", "US")]));
        assert_eq!(v.errors().first_message("zip"), Some("ZIP codes have 5 digits"));

        let v = rules.apply(Validator::new("en"), "zip", "1234", &related(&[("country", "DE")]));
        assert!(v.is_valid());
    }

    #[test]
    fn test_form_rules_keep_registration_order() {
        let form = FormRules::new()
            .field("name", FieldRules::new().required())
            .field("email", FieldRules::new().required().rule(Rule::Email).lookup(LookupCheck::Unique))
            .field("name", FieldRules::new().required().rule(Rule::MinLength(2)));

        assert_eq!(form.field_names().collect::<Vec<_>>(), vec!["name", "email"]);
        assert_eq!(form.get("email").unwrap().lookup_check(), Some(LookupCheck::Unique));
        assert!(form.get("name").unwrap().is_required());

        let errors = form.check_all(Validator::new("en"), &related(&[("name", "A"), ("email", "nope")]));
        assert_eq!(errors.codes(), vec!["min_length", "invalid_email"]);
    }
}
