//! Input validation.
//!
//! Every mutating payload is described by a [`Schema`]: an all-`Option`
//! struct carrying `validator` attributes. The same struct is the partial
//! (PATCH) variant; [`Schema::into_full`] derives the full variant by
//! demanding the required fields. Errors are reported as a flat map from
//! dotted field path to message, returned verbatim in 400 bodies.

pub mod schemas;
pub mod upload;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::errors::AppError;

/// Dotted field path → human readable message.
pub type FieldErrors = BTreeMap<String, String>;

pub const REQUIRED: &str = "Required";

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("uuid pattern compiles")
});

pub trait Schema: DeserializeOwned + Validate {
    type Full;

    /// Cross-field and per-element rules the derive attributes cannot express.
    fn check_rules(&self, _errors: &mut FieldErrors) {}

    /// Build the full variant, reporting every missing required field.
    fn into_full(self) -> Result<Self::Full, FieldErrors>;
}

/// Validate `input` against the full variant of `S`.
pub fn validate<S: Schema>(input: &Value) -> Result<S::Full, FieldErrors> {
    let schema: S = parse(input)?;
    let mut errors = collect(&schema);

    match schema.into_full() {
        Ok(full) if errors.is_empty() => Ok(full),
        Ok(_) => Err(errors),
        Err(missing) => {
            for (path, message) in missing {
                errors.entry(path).or_insert(message);
            }
            Err(errors)
        }
    }
}

/// Validate `input` against the partial variant of `S` (every field optional).
pub fn validate_partial<S: Schema>(input: &Value) -> Result<S, FieldErrors> {
    let schema: S = parse(input)?;
    check(schema)
}

/// Validate an already-deserialized schema value, e.g. query parameters.
pub fn check<S: Schema>(schema: S) -> Result<S, FieldErrors> {
    let errors = collect(&schema);
    if errors.is_empty() {
        Ok(schema)
    } else {
        Err(errors)
    }
}

fn parse<S: DeserializeOwned>(input: &Value) -> Result<S, FieldErrors> {
    S::deserialize(input).map_err(|e| single("body", e.to_string()))
}

fn collect<S: Schema>(schema: &S) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if let Err(e) = schema.validate() {
        flatten_into("", &e, &mut errors);
    }
    schema.check_rules(&mut errors);
    errors
}

fn flatten_into(prefix: &str, errors: &ValidationErrors, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(first) = list.first() {
                    out.entry(path).or_insert_with(|| message_of(first));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten_into(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten_into(&format!("{path}.{index}"), inner, out);
                }
            }
        }
    }
}

fn message_of(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => format!("Invalid value ({})", error.code),
    }
}

pub fn single(path: &str, message: impl Into<String>) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.insert(path.to_string(), message.into());
    errors
}

/// Take a required field, recording `Required` under `path` when absent.
pub fn required<T>(value: Option<T>, path: &str, missing: &mut FieldErrors) -> Option<T> {
    if value.is_none() {
        missing.insert(path.to_string(), REQUIRED.to_string());
    }
    value
}

pub(crate) fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::from(message));
    error
}

pub fn is_uuid(raw: &str) -> bool {
    UUID_RE.is_match(raw)
}

/// Check a path parameter against the canonical 8-4-4-4-12 form before any
/// store access.
pub fn parse_id(raw: &str, resource: &str) -> Result<Uuid, AppError> {
    if !is_uuid(raw) {
        return Err(AppError::BadRequest(format!("Invalid {resource} ID format")));
    }
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid {resource} ID format")))
}
