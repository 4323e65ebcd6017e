//! Payload validation from per-field config rules.

use crate::config::FieldRule;
use crate::error::{ApiError, ValidationErrors};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type Rules = BTreeMap<String, FieldRule>;

pub struct RequestValidator;

impl RequestValidator {
    /// Every rule applies; required fields must be present and non-null.
    pub fn validate_create(body: &Map<String, Value>, rules: &Rules) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        for (col, field) in rules {
            let val = body.get(col);
            if field.rule.required == Some(true) && val.map_or(true, Value::is_null) {
                errors.add(col, format!("{} is required", col));
                continue;
            }
            if let Some(v) = val {
                validate_field(col, v, field, &mut errors);
            }
        }
        errors.into_result()
    }

    /// Only the rules of submitted fields apply; `required` still rejects an explicit null.
    pub fn validate_partial(body: &Map<String, Value>, rules: &Rules) -> Result<(), ApiError> {
        Self::validate_create(body, &restrict_rules(rules, body))
    }
}

/// Keep only the rules whose field appears in `body`.
pub fn restrict_rules(rules: &Rules, body: &Map<String, Value>) -> Rules {
    rules
        .iter()
        .filter(|(col, _)| body.contains_key(col.as_str()))
        .map(|(col, rule)| (col.clone(), rule.clone()))
        .collect()
}

fn validate_field(col: &str, v: &Value, field: &FieldRule, errors: &mut ValidationErrors) {
    if v.is_null() {
        return;
    }
    let rule = &field.rule;
    if let Some(format) = &rule.format {
        if let Some(msg) = check_format(col, v, format) {
            errors.add(col, msg);
        }
    }
    if let (Some(max), Some(s)) = (rule.max_length, v.as_str()) {
        if s.chars().count() > max as usize {
            errors.add(col, format!("{} must be at most {} characters", col, max));
        }
    }
    if let (Some(min), Some(s)) = (rule.min_length, v.as_str()) {
        if s.chars().count() < min as usize {
            errors.add(col, format!("{} must be at least {} characters", col, min));
        }
    }
    if let (Some(re), Some(s)) = (&field.pattern, v.as_str()) {
        if !re.is_match(s) {
            errors.add(col, format!("{} does not match required pattern", col));
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            errors.add(
                col,
                format!(
                    "{} must be one of: {:?}",
                    col,
                    allowed.iter().take(5).collect::<Vec<_>>()
                ),
            );
        }
    }
    if let (Some(min), Some(n)) = (rule.minimum, v.as_f64()) {
        if n < min {
            errors.add(col, format!("{} must be at least {}", col, min));
        }
    }
    if let (Some(max), Some(n)) = (rule.maximum, v.as_f64()) {
        if n > max {
            errors.add(col, format!("{} must be at most {}", col, max));
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(col: &str, v: &Value, format: &str) -> Option<String> {
    let s = v.as_str()?;
    match format.to_lowercase().as_str() {
        "email" if !s.contains('@') || s.len() < 3 => Some(format!("{} must be a valid email", col)),
        "uuid" if uuid::Uuid::parse_str(s).is_err() => Some(format!("{} must be a valid UUID", col)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::compile_rules;
    use serde_json::json;

    fn rules() -> Rules {
        let declared = serde_json::from_value(json!({
            "email": { "required": true, "format": "email", "max_length": 20 },
            "name": { "required": true, "min_length": 2 },
            "role": { "allowed": ["admin", "user"] },
            "age": { "minimum": 0, "maximum": 150 },
            "slug": { "pattern": "^[a-z0-9-]+$" }
        }))
        .unwrap();
        compile_rules(&declared).unwrap()
    }

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn errors(result: Result<(), ApiError>) -> ValidationErrors {
        match result {
            Err(ApiError::Validation(e)) => e,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn create_collects_every_field() {
        let e = errors(RequestValidator::validate_create(
            &body(json!({ "email": "nope", "role": "root", "age": 200 })),
            &rules(),
        ));
        assert_eq!(e.fields().collect::<Vec<_>>(), vec!["age", "email", "name", "role"]);
        assert_eq!(e.get("name").unwrap(), ["name is required"]);
        assert_eq!(e.get("email").unwrap(), ["email must be a valid email"]);
    }

    #[test]
    fn create_accepts_valid_body() {
        RequestValidator::validate_create(
            &body(json!({ "email": "a@b.c", "name": "Al", "role": "user", "age": 30 })),
            &rules(),
        )
        .unwrap();
    }

    #[test]
    fn partial_ignores_missing_required_fields() {
        RequestValidator::validate_partial(&body(json!({ "age": 3 })), &rules()).unwrap();
        let e = errors(RequestValidator::validate_partial(
            &body(json!({ "name": "A" })),
            &rules(),
        ));
        assert_eq!(e.get("name").unwrap(), ["name must be at least 2 characters"]);
    }

    #[test]
    fn compiled_pattern_is_applied() {
        RequestValidator::validate_partial(&body(json!({ "slug": "hello-1" })), &rules()).unwrap();
        let e = errors(RequestValidator::validate_partial(
            &body(json!({ "slug": "Hello World" })),
            &rules(),
        ));
        assert_eq!(e.get("slug").unwrap(), ["slug does not match required pattern"]);
    }

    #[test]
    fn restrict_keeps_submitted_keys() {
        let restricted = restrict_rules(&rules(), &body(json!({ "age": 1, "other": 2 })));
        assert_eq!(restricted.keys().collect::<Vec<_>>(), vec!["age"]);
    }
}
