//! Integration tests for fieldgate-core
//!
//! Exercises a realistic registration form through the public API:
//! declarative rules, cross-field rules, the content filter and locales.

use fieldgate_core::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn registration() -> FormRules {
    FormRules::new()
        .field("name", FieldRules::new().security().required().rule(Rule::LengthRange(2, 50)))
        .field(
            "email",
            FieldRules::new().security().required().rule(Rule::Email).lookup(LookupCheck::Unique),
        )
        .field("age", FieldRules::new().rule(Rule::Integer).rule(Rule::Range(13.0, 120.0)))
        .field(
            "password",
            FieldRules::new().required().rule(Rule::Password(PasswordPolicy::medium())),
        )
        .field(
            "password_confirmation",
            FieldRules::new().required().rule(Rule::PasswordConfirmation("password".into())),
        )
}

fn values(pairs: &[(&str, &str)]) -> Related {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn test_complete_valid_submission() {
    let form = registration();
    let errors = form.check_all(
        Validator::new("en"),
        &values(&[
            ("name", "Ada Lovelace"),
            ("email", "ada@example.com"),
            ("age", "36"),
            ("password", "Engine1843"),
            ("password_confirmation", "Engine1843"),
        ]),
    );
    assert!(errors.is_valid(), "unexpected errors: {:?}", errors);
}

#[test]
fn test_errors_follow_registration_order() {
    let form = registration();
    let errors = form.check_all(
        Validator::new("en"),
        &values(&[
            ("name", ""),
            ("email", "not-an-email"),
            ("age", "twelve"),
            ("password", "short"),
            ("password_confirmation", "shorter"),
        ]),
    );

    assert_eq!(
        errors.codes(),
        vec!["required", "invalid_email", "invalid_integer", "invalid_number", "password_weak", "password_mismatch"]
    );
    assert_eq!(errors.first_message("password_confirmation"), Some("Passwords do not match"));
}

#[test]
fn test_optional_field_may_be_empty() {
    let form = registration();
    let errors = form.check_all(
        Validator::new("en"),
        &values(&[
            ("name", "Ada"),
            ("email", "ada@example.com"),
            ("password", "Engine1843"),
            ("password_confirmation", "Engine1843"),
        ]),
    );
    assert!(!errors.has_errors_for_field("age"));
}

#[test]
fn test_injection_in_name_reports_only_the_violation() {
    let rules = registration();
    let name_rules = rules.get("name").unwrap();
    let v = name_rules.apply(Validator::new("en"), "name", "x'; DROP TABLE users; --", &Related::new());

    assert_eq!(v.errors().codes(), vec!["security_violation"]);
}

#[test]
fn test_spanish_messages() {
    let form = registration();
    let errors = form.check_all(Validator::new("es-MX"), &values(&[("email", "malo")]));
    assert_eq!(errors.first_message("name"), Some("Name es obligatorio"));
    assert_eq!(errors.first_message("email"), Some("Email debe ser un correo electrónico válido"));
}

#[test]
fn test_catalog_from_toml_overrides_messages() {
    let mut catalog = MessageCatalog::builtin();
    catalog
        .merge_toml(
            r#"
            [en]
            invalid_email = "That doesn't look like an email address"
            "#,
        )
        .unwrap();

    let v = Validator::with_messages("en", Arc::new(catalog)).email("email", "nope");
    assert_eq!(v.errors().first_message("email"), Some("That doesn't look like an email address"));
}

#[test]
fn test_lookup_result_folds_into_response() {
    let v = Validator::new("en")
        .required("username", "existinguser")
        .lookup_outcome("username", &LookupOutcome::from_exists(LookupCheck::Unique, true));

    let response = FieldValidationResponse::from_errors("username", v.into_errors());
    assert!(!response.valid);
    assert_eq!(response.error.as_deref(), Some("This username is already taken"));
    assert_eq!(response.errors.codes(), vec!["username_taken"]);
}
