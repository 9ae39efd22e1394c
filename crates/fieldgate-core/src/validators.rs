// File: src/validators.rs
// Purpose: Pure predicates behind the rule engine (no error formatting, no I/O)

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::messages::keys;

// Email validation regex (RFC-lite)
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

// E.164 after punctuation has been stripped
static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").unwrap());

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[^\s/$.?#][^\s.]*(\.[^\s.]+)+[^\s]*$").unwrap()
});

static MARKUP_INJECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(<\s*/?\s*(script|iframe|object|embed)\b|javascript\s*:|\bon[a-z]+\s*=)").unwrap()
});

static SQL_INJECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)('\s*(or|and)\s+'?\d+'?\s*=\s*'?\d+|\bunion\s+(all\s+)?select\b|;\s*(drop|delete|truncate|alter)\s+|--\s*$|/\*.*\*/)",
    )
    .unwrap()
});

/// Accepted date layouts, tried in order; the first that parses wins.
///
/// Ambiguous inputs resolve to the earliest entry (`01/02/2006` is read as
/// January 2nd because `%m/%d/%Y` precedes `%d-%m-%Y`).
pub const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Validate email format
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Strip the punctuation people type into phone numbers
pub fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect()
}

/// Validate phone format after normalization
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_REGEX.is_match(&normalize_phone(phone))
}

/// Validate URL format (http/https with a dotted host)
pub fn is_valid_url(url: &str) -> bool {
    URL_REGEX.is_match(url)
}

pub fn is_alpha(value: &str) -> bool {
    value.chars().all(char::is_alphabetic)
}

pub fn is_alphanumeric(value: &str) -> bool {
    value.chars().all(char::is_alphanumeric)
}

/// Parse a date using the first matching entry of [`DATE_FORMATS`]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Length in characters, not bytes
pub fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Detect script or SQL injection fragments in user input
pub fn detect_injection(value: &str) -> Option<InjectionKind> {
    if MARKUP_INJECTION.is_match(value) {
        Some(InjectionKind::Markup)
    } else if SQL_INJECTION.is_match(value) {
        Some(InjectionKind::Sql)
    } else {
        None
    }
}

/// Category of a content-filter trip, reported in audit logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionKind {
    Markup,
    Sql,
}

impl InjectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjectionKind::Markup => "markup",
            InjectionKind::Sql => "sql",
        }
    }
}

/// Password composition requirements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: usize,
    #[serde(default)]
    pub require_digit: bool,
    #[serde(default)]
    pub require_symbol: bool,
    #[serde(default)]
    pub require_mixed_case: bool,
}

impl PasswordPolicy {
    /// 6+ characters
    pub fn basic() -> Self {
        Self {
            min_length: 6,
            require_digit: false,
            require_symbol: false,
            require_mixed_case: false,
        }
    }

    /// 8+ chars with uppercase, lowercase, and digit
    pub fn medium() -> Self {
        Self {
            min_length: 8,
            require_digit: true,
            require_symbol: false,
            require_mixed_case: true,
        }
    }

    /// 8+ chars with uppercase, lowercase, digit, and special character
    pub fn strong() -> Self {
        Self {
            min_length: 8,
            require_digit: true,
            require_symbol: true,
            require_mixed_case: true,
        }
    }

    /// Parse a named tier; unknown names get the strong tier
    pub fn parse(name: &str) -> Self {
        match name {
            "basic" => Self::basic(),
            "medium" => Self::medium(),
            _ => Self::strong(),
        }
    }

    /// Check a password, returning the first unmet requirement
    pub fn check(&self, password: &str) -> Result<(), PasswordRequirement> {
        if char_len(password) < self.min_length {
            return Err(PasswordRequirement::MinLength);
        }
        if self.require_mixed_case {
            if !password.chars().any(|c| c.is_uppercase()) {
                return Err(PasswordRequirement::Uppercase);
            }
            if !password.chars().any(|c| c.is_lowercase()) {
                return Err(PasswordRequirement::Lowercase);
            }
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordRequirement::Digit);
        }
        if self.require_symbol && !password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
            return Err(PasswordRequirement::Symbol);
        }
        Ok(())
    }
}

/// A password requirement that was not met.
///
/// Carries no text; the message catalog translates [`message_key`](Self::message_key).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRequirement {
    MinLength,
    Uppercase,
    Lowercase,
    Digit,
    Symbol,
}

impl PasswordRequirement {
    pub fn message_key(&self) -> &'static str {
        match self {
            PasswordRequirement::MinLength => keys::PASSWORD_MIN_LENGTH,
            PasswordRequirement::Uppercase => keys::PASSWORD_UPPERCASE,
            PasswordRequirement::Lowercase => keys::PASSWORD_LOWERCASE,
            PasswordRequirement::Digit => keys::PASSWORD_DIGIT,
            PasswordRequirement::Symbol => keys::PASSWORD_SYMBOL,
        }
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::medium()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("user@example.com", true)]
    #[case("first.last+tag@sub.example.co.uk", true)]
    #[case("not-an-email", false)]
    #[case("missing@tld", false)]
    #[case("@example.com", false)]
    fn test_email(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_email(input), expected);
    }

    #[rstest]
    #[case("+1 (555) 123-4567", true)]
    #[case("555.123.4567", true)]
    #[case("+447911123456", true)]
    #[case("0123456", false)]
    #[case("12345678901234567", false)]
    #[case("call me", false)]
    fn test_phone(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_phone(input), expected);
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+1 (555) 123-4567"), "+15551234567");
    }

    #[rstest]
    #[case("https://example.com", true)]
    #[case("http://test.co.uk/path?q=1", true)]
    #[case("example.com", false)]
    #[case("ftp://example.com", false)]
    #[case("http://nodomain", false)]
    fn test_url(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_url(input), expected);
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2006, 1, 2).unwrap();
        assert_eq!(parse_date("2006-01-02"), Some(expected));
        assert_eq!(parse_date("01/02/2006"), Some(expected));
        assert_eq!(parse_date("02-01-2006"), Some(expected));
        assert_eq!(parse_date("2006/01/02"), Some(expected));
        assert_eq!(parse_date("Jan 02, 2006"), Some(expected));
        assert_eq!(parse_date("January 02, 2006"), Some(expected));
        assert_eq!(parse_date("2006-13-45"), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_ambiguous_date_takes_first_format() {
        // 03/04/2020 reads as March 4th, never April 3rd
        assert_eq!(parse_date("03/04/2020"), NaiveDate::from_ymd_opt(2020, 3, 4));
    }

    #[test]
    fn test_alpha_checks() {
        assert!(is_alpha("José"));
        assert!(!is_alpha("abc1"));
        assert!(is_alphanumeric("abc123"));
        assert!(!is_alphanumeric("abc 123"));
    }

    #[test]
    fn test_password_tiers() {
        assert!(PasswordPolicy::basic().check("simple").is_ok());
        assert!(PasswordPolicy::basic().check("short").is_err());

        assert!(PasswordPolicy::medium().check("Password123").is_ok());
        assert!(PasswordPolicy::medium().check("lowercase1").is_err());
        assert!(PasswordPolicy::medium().check("NoDigits").is_err());

        assert!(PasswordPolicy::strong().check("Password123!").is_ok());
        assert_eq!(PasswordPolicy::strong().check("NoSpecial123"), Err(PasswordRequirement::Symbol));
        assert_eq!(PasswordPolicy::medium().check("Sh0rt"), Err(PasswordRequirement::MinLength));
        assert_eq!(PasswordPolicy::parse("anything"), PasswordPolicy::strong());
    }

    #[rstest]
    #[case("<script>alert(1)</script>", Some(InjectionKind::Markup))]
    #[case("<img src=x onerror=alert(1)>", Some(InjectionKind::Markup))]
    #[case("javascript:void(0)", Some(InjectionKind::Markup))]
    #[case("' OR 1=1", Some(InjectionKind::Sql))]
    #[case("x'; DROP TABLE users", Some(InjectionKind::Sql))]
    #[case("1 UNION SELECT password FROM users", Some(InjectionKind::Sql))]
    #[case("O'Brien", None)]
    #[case("Selection of union members", None)]
    fn test_injection_detection(#[case] input: &str, #[case] expected: Option<InjectionKind>) {
        assert_eq!(detect_injection(input), expected);
    }
}
