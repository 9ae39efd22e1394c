// File: src/lookup.rs
// Purpose: Vocabulary shared between the rule engine and external lookup implementations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which external query a field needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupCheck {
    /// Value must not already exist (email, username)
    Unique,
    /// Value must reference an existing record
    Exists,
}

impl LookupCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupCheck::Unique => "unique",
            LookupCheck::Exists => "exists",
        }
    }
}

impl fmt::Display for LookupCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LookupCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unique" => Ok(LookupCheck::Unique),
            "exists" => Ok(LookupCheck::Exists),
            other => Err(format!("unknown check variant: {}", other)),
        }
    }
}

/// Result of running a lookup, ready to be folded into an error set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Passed,
    /// Unique check found an existing record
    Taken,
    /// Exists check found nothing
    NotFound,
    /// The lookup itself failed; never a durable fact
    Failed(String),
}

impl LookupOutcome {
    /// Interpret a raw "does a matching record exist" answer for a check
    pub fn from_exists(check: LookupCheck, exists: bool) -> Self {
        match (check, exists) {
            (LookupCheck::Unique, true) => LookupOutcome::Taken,
            (LookupCheck::Exists, false) => LookupOutcome::NotFound,
            _ => LookupOutcome::Passed,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, LookupOutcome::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_exists() {
        assert_eq!(LookupOutcome::from_exists(LookupCheck::Unique, true), LookupOutcome::Taken);
        assert_eq!(LookupOutcome::from_exists(LookupCheck::Unique, false), LookupOutcome::Passed);
        assert_eq!(LookupOutcome::from_exists(LookupCheck::Exists, false), LookupOutcome::NotFound);
        assert_eq!(LookupOutcome::from_exists(LookupCheck::Exists, true), LookupOutcome::Passed);
    }

    #[test]
    fn test_parse_check() {
        assert_eq!("unique".parse::<LookupCheck>(), Ok(LookupCheck::Unique));
        assert_eq!("EXISTS".parse::<LookupCheck>(), Ok(LookupCheck::Exists));
        assert!("other".parse::<LookupCheck>().is_err());
    }
}
