//! Form-layer payload checks
//!
//! Payloads are assembled from `--data` JSON and `--set key=value` pairs and
//! checked against the resource descriptor before anything is sent. A
//! rejected payload never reaches the mutation coordinator.

use serde_json::Value;

use crate::error::ValidationError;
use crate::resource::{Record, ResourceDescriptor};

/// Build a payload from an optional JSON object plus `key=value` overrides.
///
/// Values that parse as JSON (numbers, booleans, null, quoted strings,
/// arrays, objects) are taken as such; anything else is a string.
pub fn build_payload(data: Option<&str>, assignments: &[String]) -> Result<Record, ValidationError> {
    let mut errors = ValidationError::new();

    let mut record = match data {
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                errors.push("data", "must be a JSON object");
                Record::new()
            }
            Err(e) => {
                errors.push("data", format!("is not valid JSON ({})", e));
                Record::new()
            }
        },
        None => Record::new(),
    };

    for pair in assignments {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                record.insert(key.trim().to_string(), parse_value(value));
            }
            _ => errors.push(pair.as_str(), "expected key=value"),
        }
    }

    if errors.is_empty() {
        Ok(record)
    } else {
        Err(errors)
    }
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Check a create payload: every required field present and non-blank.
pub fn validate_create(descriptor: &ResourceDescriptor, record: &Record) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();

    for field in descriptor.required_fields {
        match record.get(*field) {
            None | Some(Value::Null) => errors.push(*field, "is required"),
            Some(value) if is_blank(value) => errors.push(*field, "must not be blank"),
            Some(_) => {}
        }
    }

    check_formats(record, &mut errors);
    finish(errors)
}

/// Check an update payload: non-empty, and required fields it touches stay
/// non-blank.
pub fn validate_update(descriptor: &ResourceDescriptor, record: &Record) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();

    if record.is_empty() {
        errors.push("payload", "must set at least one field");
    }

    for field in descriptor.required_fields {
        if let Some(value) = record.get(*field) {
            if value.is_null() || is_blank(value) {
                errors.push(*field, "must not be blank");
            }
        }
    }

    check_formats(record, &mut errors);
    finish(errors)
}

fn is_blank(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim().is_empty())
}

fn check_formats(record: &Record, errors: &mut ValidationError) {
    if let Some(Value::String(email)) = record.get("email") {
        if !email.trim().is_empty() && !looks_like_email(email) {
            errors.push("email", "is not a valid email address");
        }
    }
}

fn looks_like_email(text: &str) -> bool {
    match text.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !text.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn finish(errors: ValidationError) -> Result<(), ValidationError> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
