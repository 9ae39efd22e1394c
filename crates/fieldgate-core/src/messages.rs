//! Message resolution for validation errors
//!
//! Rule engines never format user-facing text themselves. They hand a code,
//! a locale and a few named arguments to a [`MessageResolver`] injected at
//! construction time. [`MessageCatalog`] is the default resolver: a
//! locale -> code -> template table with a fallback chain
//! (`es-MX` -> `es` -> fallback locale -> generic message).

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::codes;

/// Resolves a machine code into a human-facing message
pub trait MessageResolver: Send + Sync {
    /// `args` are `(name, value)` pairs substituted into `{name}` placeholders
    fn resolve(&self, code: &str, locale: &str, args: &[(&str, &str)]) -> String;
}

const GENERIC_TEMPLATE: &str = "{field} is invalid";

/// Message keys that are not error codes.
///
/// They pick a template for part of a message: the direction of a date
/// comparison, or the unmet requirement inside `password_weak`.
pub mod keys {
    pub const DATE_AFTER: &str = "date_after";
    pub const DATE_BEFORE: &str = "date_before";
    pub const PASSWORD_MIN_LENGTH: &str = "password_min_length";
    pub const PASSWORD_UPPERCASE: &str = "password_uppercase";
    pub const PASSWORD_LOWERCASE: &str = "password_lowercase";
    pub const PASSWORD_DIGIT: &str = "password_digit";
    pub const PASSWORD_SYMBOL: &str = "password_symbol";

    pub const ALL: &[&str] = &[
        DATE_AFTER,
        DATE_BEFORE,
        PASSWORD_MIN_LENGTH,
        PASSWORD_UPPERCASE,
        PASSWORD_LOWERCASE,
        PASSWORD_DIGIT,
        PASSWORD_SYMBOL,
    ];
}

/// Locale-keyed message templates
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    locales: HashMap<String, HashMap<String, String>>,
    fallback_locale: String,
}

impl MessageCatalog {
    /// Empty catalog; every lookup ends at the generic message
    pub fn empty(fallback_locale: impl Into<String>) -> Self {
        Self {
            locales: HashMap::new(),
            fallback_locale: fallback_locale.into(),
        }
    }

    /// Catalog with the built-in `en` and `es` templates, falling back to `en`
    pub fn builtin() -> Self {
        let mut catalog = Self::empty("en");
        for (code, template) in ENGLISH {
            catalog.insert("en", code, template);
        }
        for (code, template) in SPANISH {
            catalog.insert("es", code, template);
        }
        catalog
    }

    pub fn fallback_locale(&self) -> &str {
        &self.fallback_locale
    }

    pub fn with_fallback_locale(mut self, locale: impl Into<String>) -> Self {
        self.fallback_locale = locale.into();
        self
    }

    pub fn insert(&mut self, locale: &str, code: &str, template: &str) {
        self.locales
            .entry(normalize_locale(locale))
            .or_default()
            .insert(code.to_string(), template.to_string());
    }

    pub fn has_locale(&self, locale: &str) -> bool {
        self.locales.contains_key(&normalize_locale(locale))
    }

    /// Merge templates from a TOML document of the form
    ///
    /// ```toml
    /// [en]
    /// required = "{field} cannot be blank"
    /// ```
    pub fn merge_toml(&mut self, content: &str) -> Result<()> {
        let parsed: HashMap<String, HashMap<String, String>> =
            toml::from_str(content).context("Failed to parse message catalog")?;

        for (locale, templates) in parsed {
            for (code, template) in templates {
                self.insert(&locale, &code, &template);
            }
        }

        Ok(())
    }

    /// Load the built-in catalog and merge overrides from a TOML file.
    ///
    /// A missing file yields the built-in catalog unchanged.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut catalog = Self::builtin();

        if !path.exists() {
            return Ok(catalog);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read message catalog: {:?}", path))?;
        catalog
            .merge_toml(&content)
            .with_context(|| format!("Invalid message catalog: {:?}", path))?;

        Ok(catalog)
    }

    fn template(&self, code: &str, locale: &str) -> &str {
        let locale = normalize_locale(locale);
        let language = locale.split('-').next().unwrap_or(&locale).to_string();

        [locale.as_str(), language.as_str(), self.fallback_locale.as_str()]
            .iter()
            .find_map(|candidate| self.locales.get(*candidate)?.get(code))
            .map(String::as_str)
            .unwrap_or(GENERIC_TEMPLATE)
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MessageResolver for MessageCatalog {
    fn resolve(&self, code: &str, locale: &str, args: &[(&str, &str)]) -> String {
        interpolate(self.template(code, locale), args)
    }
}

/// Replace `{name}` placeholders in one pass over the template.
///
/// Unknown placeholders are left as-is, and substituted values are never
/// scanned again.
pub fn interpolate(template: &str, args: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            rest = &rest[open..];
            break;
        };

        let name = &after[..close];
        match args.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

/// Turn a field name into a label: `password_confirmation` -> `Password confirmation`
pub fn humanize(field: &str) -> String {
    let spaced = field.replace(['_', '-'], " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn normalize_locale(locale: &str) -> String {
    locale.trim().replace('_', "-").to_lowercase()
}

const ENGLISH: &[(&str, &str)] = &[
    (codes::REQUIRED, "{field} is required"),
    (codes::MIN_LENGTH, "{field} must be at least {min} characters"),
    (codes::MAX_LENGTH, "{field} must be at most {max} characters"),
    (codes::LENGTH_RANGE, "{field} must be between {min} and {max} characters"),
    (codes::INVALID_EMAIL, "{field} must be a valid email address"),
    (codes::INVALID_PHONE, "{field} must be a valid phone number"),
    (codes::INVALID_URL, "{field} must be a valid URL"),
    (codes::INVALID_NUMBER, "{field} must be a number"),
    (codes::INVALID_INTEGER, "{field} must be a whole number"),
    (codes::INVALID_DATE, "{field} must be a valid date"),
    (codes::INVALID_ALPHANUMERIC, "{field} may only contain letters and numbers"),
    (codes::INVALID_ALPHA, "{field} may only contain letters"),
    (codes::INVALID_OPTION, "{field} must be one of: {options}"),
    (codes::MIN_VALUE, "{field} must be at least {min}"),
    (codes::MAX_VALUE, "{field} must be at most {max}"),
    (codes::VALUE_RANGE, "{field} must be between {min} and {max}"),
    (codes::PATTERN_MISMATCH, "{field} has an invalid format"),
    (codes::PASSWORD_WEAK, "{field} is too weak: {reason}"),
    (codes::PASSWORD_MISMATCH, "Passwords do not match"),
    (codes::FIELDS_MISMATCH, "{field} must match {other}"),
    (codes::DATE_COMPARISON, "{field} is out of order with {other}"),
    (codes::EMAIL_TAKEN, "This email address is already taken"),
    (codes::USERNAME_TAKEN, "This username is already taken"),
    (codes::VALUE_TAKEN, "{field} is already taken"),
    (codes::RECORD_NOT_FOUND, "{field} does not match an existing record"),
    (codes::BUSINESS_RULE, "{field} is not allowed"),
    (codes::VALIDATION_ERROR, "{field} could not be verified right now, please try again"),
    (codes::SECURITY_VIOLATION, "{field} contains disallowed content"),
    (keys::DATE_AFTER, "{field} must be after {other}"),
    (keys::DATE_BEFORE, "{field} must be before {other}"),
    (keys::PASSWORD_MIN_LENGTH, "must be at least {min} characters"),
    (keys::PASSWORD_UPPERCASE, "must contain at least one uppercase letter"),
    (keys::PASSWORD_LOWERCASE, "must contain at least one lowercase letter"),
    (keys::PASSWORD_DIGIT, "must contain at least one digit"),
    (keys::PASSWORD_SYMBOL, "must contain at least one special character"),
];

const SPANISH: &[(&str, &str)] = &[
    (codes::REQUIRED, "{field} es obligatorio"),
    (codes::MIN_LENGTH, "{field} debe tener al menos {min} caracteres"),
    (codes::MAX_LENGTH, "{field} debe tener como máximo {max} caracteres"),
    (codes::LENGTH_RANGE, "{field} debe tener entre {min} y {max} caracteres"),
    (codes::INVALID_EMAIL, "{field} debe ser un correo electrónico válido"),
    (codes::INVALID_PHONE, "{field} debe ser un número de teléfono válido"),
    (codes::INVALID_URL, "{field} debe ser una URL válida"),
    (codes::INVALID_NUMBER, "{field} debe ser un número"),
    (codes::INVALID_INTEGER, "{field} debe ser un número entero"),
    (codes::INVALID_DATE, "{field} debe ser una fecha válida"),
    (codes::INVALID_ALPHANUMERIC, "{field} solo puede contener letras y números"),
    (codes::INVALID_ALPHA, "{field} solo puede contener letras"),
    (codes::INVALID_OPTION, "{field} debe ser uno de: {options}"),
    (codes::MIN_VALUE, "{field} debe ser al menos {min}"),
    (codes::MAX_VALUE, "{field} debe ser como máximo {max}"),
    (codes::VALUE_RANGE, "{field} debe estar entre {min} y {max}"),
    (codes::PATTERN_MISMATCH, "{field} tiene un formato inválido"),
    (codes::PASSWORD_WEAK, "{field} es demasiado débil: {reason}"),
    (codes::PASSWORD_MISMATCH, "Las contraseñas no coinciden"),
    (codes::FIELDS_MISMATCH, "{field} debe coincidir con {other}"),
    (codes::DATE_COMPARISON, "{field} no está en orden con {other}"),
    (codes::EMAIL_TAKEN, "Este correo electrónico ya está registrado"),
    (codes::USERNAME_TAKEN, "Este nombre de usuario ya está en uso"),
    (codes::VALUE_TAKEN, "{field} ya está en uso"),
    (codes::RECORD_NOT_FOUND, "{field} no corresponde a ningún registro"),
    (codes::BUSINESS_RULE, "{field} no está permitido"),
    (codes::VALIDATION_ERROR, "No se pudo verificar {field}, inténtelo de nuevo"),
    (codes::SECURITY_VIOLATION, "{field} contiene contenido no permitido"),
    (keys::DATE_AFTER, "{field} debe ser posterior a {other}"),
    (keys::DATE_BEFORE, "{field} debe ser anterior a {other}"),
    (keys::PASSWORD_MIN_LENGTH, "debe tener al menos {min} caracteres"),
    (keys::PASSWORD_UPPERCASE, "debe contener al menos una letra mayúscula"),
    (keys::PASSWORD_LOWERCASE, "debe contener al menos una letra minúscula"),
    (keys::PASSWORD_DIGIT, "debe contener al menos un número"),
    (keys::PASSWORD_SYMBOL, "debe contener al menos un carácter especial"),
];
