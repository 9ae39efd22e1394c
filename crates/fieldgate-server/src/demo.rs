// File: src/demo.rs
// Purpose: Rule set for the demo registration form served by this binary

use fieldgate_core::{FieldRules, FormRules, LookupCheck, PasswordPolicy, Rule};
use fieldgate_runtime::InMemoryLookup;

const RESERVED_USERNAMES: &[&str] = &["admin", "root", "support", "system"];

/// Registration form: name, email, username, phone, website, age,
/// password (+ confirmation) and an optional date range
pub fn registration_rules() -> FormRules {
    FormRules::new()
        .field(
            "name",
            FieldRules::new()
                .security()
                .required()
                .rule(Rule::LengthRange(2, 100)),
        )
        .field(
            "email",
            FieldRules::new()
                .security()
                .required()
                .rule(Rule::MaxLength(254))
                .rule(Rule::Email)
                .lookup(LookupCheck::Unique),
        )
        .field(
            "username",
            FieldRules::new()
                .security()
                .required()
                .rule(Rule::LengthRange(3, 20))
                .rule(Rule::AlphaNumeric)
                .business(|value, _| {
                    let reserved = RESERVED_USERNAMES.contains(&value.to_lowercase().as_str());
                    (!reserved, "This username is reserved".to_string())
                })
                .lookup(LookupCheck::Unique),
        )
        .field("phone", FieldRules::new().security().rule(Rule::Phone))
        .field("website", FieldRules::new().security().rule(Rule::Url))
        .field(
            "age",
            FieldRules::new().rule(Rule::Integer).rule(Rule::Range(13.0, 120.0)),
        )
        .field(
            "password",
            FieldRules::new()
                .required()
                .rule(Rule::Password(PasswordPolicy::medium())),
        )
        .field(
            "password_confirmation",
            FieldRules::new()
                .required()
                .rule(Rule::PasswordConfirmation("password".to_string())),
        )
        .field("start_date", FieldRules::new().rule(Rule::Date))
        .field(
            "end_date",
            FieldRules::new()
                .rule(Rule::Date)
                .rule(Rule::After("start_date".to_string())),
        )
}

/// Lookup used when no database is configured, seeded with a couple of
/// accounts so uniqueness checks have something to report
pub fn demo_lookup() -> InMemoryLookup {
    InMemoryLookup::new()
        .with_record("username", "existinguser", "1")
        .with_record("email", "existing@example.com", "1")
}
