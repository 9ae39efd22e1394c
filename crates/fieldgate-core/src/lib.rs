// File: src/lib.rs
// Purpose: Field validation rules, error accumulation and message resolution

pub mod engine;
pub mod error;
pub mod lookup;
pub mod messages;
pub mod ruleset;
pub mod validators;
pub mod wire;

pub use engine::{builtin_messages, Validator};
pub use error::{codes, ErrorSet, ValidationError};
pub use lookup::{LookupCheck, LookupOutcome};
pub use messages::{humanize, MessageCatalog, MessageResolver};
pub use ruleset::{BusinessRule, FieldRules, FormRules, Related, Rule};
pub use validators::{PasswordPolicy, PasswordRequirement};
pub use wire::{
    BatchValidationRequest, BatchValidationResponse, FieldResult, FieldValidationRequest,
    FieldValidationResponse,
};
