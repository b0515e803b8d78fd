//! Value coercion and declarative field validation

use crate::contract::{FieldDefinition, FieldType, TypedValue, ValidationRules};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use jsonschema::Validator;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Whether the input counts as "no value supplied"
pub fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Convert arbitrary input into a typed value.
///
/// Returns `None` for absent input and for input that cannot be represented
/// as the requested type. Never fails.
pub fn coerce(value: &Value, field_type: FieldType) -> Option<TypedValue> {
    if is_absent(value) {
        return None;
    }

    match field_type {
        FieldType::Text => Some(TypedValue::Text(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        FieldType::Number => coerce_number(value).map(TypedValue::Number),
        FieldType::Boolean => Some(TypedValue::Boolean(match value {
            Value::Bool(b) => *b,
            Value::String(s) => s == "true" || s == "1",
            _ => false,
        })),
        FieldType::Date => coerce_date(value).map(TypedValue::Date),
        FieldType::Json | FieldType::Multiselect => Some(TypedValue::Json(match value {
            Value::String(s) => {
                serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone()))
            }
            other => other.clone(),
        })),
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn coerce_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date(s.trim()),
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Regex and JSON Schema rules compiled once, ready for repeated validation
#[derive(Clone, Default)]
pub struct CompiledRules {
    regex: Option<Regex>,
    schema: Option<Arc<Validator>>,
}

impl CompiledRules {
    /// Compile the pattern and schema of a rule set.
    ///
    /// The error is the validation message reported for the field.
    pub fn compile(field_name: &str, rules: &ValidationRules) -> Result<Self, String> {
        let regex = rules
            .regex
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| format!("{} has an invalid pattern rule: {}", field_name, e))?;
        let schema = rules
            .schema
            .as_ref()
            .map(Validator::new)
            .transpose()
            .map_err(|e| format!("{} has an invalid JSON Schema: {}", field_name, e))?
            .map(Arc::new);
        Ok(Self { regex, schema })
    }
}

impl fmt::Debug for CompiledRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRules")
            .field("regex", &self.regex.as_ref().map(Regex::as_str))
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

/// Evaluate a field definition against raw input.
///
/// Returns the first violated constraint as a message, or `None` when valid.
pub fn validate(field: &FieldDefinition, value: &Value) -> Option<String> {
    match CompiledRules::compile(&field.field_name, &field.rules) {
        Ok(compiled) => validate_compiled(field, &compiled, value),
        Err(message) => Some(message),
    }
}

/// `validate` with the definition's pattern and schema already compiled
pub fn validate_compiled(
    field: &FieldDefinition,
    compiled: &CompiledRules,
    value: &Value,
) -> Option<String> {
    if is_absent(value) {
        return field
            .is_required
            .then(|| format!("{} is required", field.field_name));
    }

    let Some(typed) = coerce(value, field.field_type) else {
        return Some(format!(
            "{} must be a valid {}",
            field.field_name, field.field_type
        ));
    };

    let rules = &field.rules;
    match (&typed, field.field_type) {
        (TypedValue::Text(text), _) => {
            validate_text(&field.field_name, text, rules, compiled.regex.as_ref())
        }
        (TypedValue::Number(n), _) => validate_number(&field.field_name, *n, rules),
        (TypedValue::Json(items), FieldType::Multiselect) => {
            validate_multiselect(&field.field_name, items, rules)
        }
        (TypedValue::Json(json), _) => compiled
            .schema
            .as_deref()
            .and_then(|schema| validate_against_schema(&field.field_name, json, schema)),
        (TypedValue::Boolean(_), _) | (TypedValue::Date(_), _) => None,
    }
}

fn validate_text(
    name: &str,
    text: &str,
    rules: &ValidationRules,
    pattern: Option<&Regex>,
) -> Option<String> {
    let len = text.chars().count();
    if let Some(min) = rules.min_length {
        if len < min {
            return Some(format!("{} must be at least {} characters", name, min));
        }
    }
    if let Some(max) = rules.max_length {
        if len > max {
            return Some(format!("{} must be at most {} characters", name, max));
        }
    }
    if let Some(re) = pattern {
        if !re.is_match(text) {
            return Some(format!("{} does not match pattern {}", name, re.as_str()));
        }
    }
    if let Some(allowed) = &rules.allowed_values {
        if !allowed.iter().any(|a| a == text) {
            return Some(format!("{} must be one of: {}", name, allowed.join(", ")));
        }
    }
    None
}

fn validate_number(name: &str, n: f64, rules: &ValidationRules) -> Option<String> {
    if let Some(min) = rules.min {
        if n < min {
            return Some(format!("{} must be at least {}", name, min));
        }
    }
    if let Some(max) = rules.max {
        if n > max {
            return Some(format!("{} must be at most {}", name, max));
        }
    }
    None
}

fn validate_multiselect(name: &str, items: &Value, rules: &ValidationRules) -> Option<String> {
    let Value::Array(items) = items else {
        return Some(format!("{} must be a list of values", name));
    };
    let allowed = rules.allowed_values.as_ref()?;
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .find(|item| !allowed.contains(item))
        .map(|item| format!("{} contains '{}' which is not one of: {}", name, item, allowed.join(", ")))
}

fn validate_against_schema(name: &str, data: &Value, validator: &Validator) -> Option<String> {
    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();
    (!errors.is_empty()).then(|| format!("{} failed schema validation: {}", name, errors.join(", ")))
}
