//! Coercion and validation of raw string values
//!
//! [`coerce`] turns the raw string a provider supplied (or its absence) into
//! a typed [`Value`] according to a compiled field rule. It never fails
//! fast: every violated rule for the field is returned so a resolution can
//! report all problems at once. Issues for secret fields never carry the
//! rejected value.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use crate::error::{IssueKind, ValidationIssue};
use crate::schema::{CompiledField, FieldType};
use crate::value::Value;

/// Conservative email grammar: dot-atom local part, dotted hostname domain
const EMAIL_PATTERN: &str = r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

/// Coerce one field
///
/// Returns `Ok(None)` only for an absent optional field without a default.
pub fn coerce(field: &CompiledField, raw: Option<&str>) -> Result<Option<Value>, Vec<ValidationIssue>> {
    let raw = match raw {
        Some(raw) => raw,
        None => {
            if let Some(default) = field.default() {
                return Ok(Some(default.clone()));
            }
            if field.is_optional() {
                return Ok(None);
            }
            return Err(vec![ValidationIssue::new(
                field.key(),
                IssueKind::MissingRequired,
                "required value is missing",
            )]);
        }
    };

    let mut problems: Vec<(IssueKind, String)> = Vec::new();

    if let Some(choices) = field.choices() {
        if !choices.iter().any(|c| c == raw) {
            problems.push((
                IssueKind::InvalidEnum,
                format!("expected one of: {}", choices.join(", ")),
            ));
        }
    }

    if let Some(pattern) = field.pattern() {
        if !pattern.is_match(raw) {
            problems.push((
                IssueKind::PatternMismatch,
                format!("does not match pattern `{}`", pattern.as_str()),
            ));
        }
    }

    match parse(field.field_type(), raw).and_then(|value| check_bounds(field, value)) {
        Ok(value) if problems.is_empty() => return Ok(Some(value)),
        Ok(_) => {}
        Err(problem) => problems.push(problem),
    }

    Err(problems
        .into_iter()
        .map(|(kind, message)| {
            let issue = ValidationIssue::new(field.key(), kind, message);
            if field.is_secret() {
                issue
            } else {
                issue.with_received(raw)
            }
        })
        .collect())
}

/// Parse a raw string as the given type
fn parse(field_type: FieldType, raw: &str) -> Result<Value, (IssueKind, String)> {
    match field_type {
        FieldType::String => Ok(Value::String(raw.to_string())),
        FieldType::Number => parse_number(raw),
        FieldType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| (IssueKind::InvalidNumber, "expected a whole number".to_string())),
        FieldType::Boolean => parse_boolean(raw),
        FieldType::Port => parse_port(raw),
        FieldType::Url => Url::parse(raw)
            .map(Value::Url)
            .map_err(|e| (IssueKind::InvalidUrl, format!("expected an absolute URL ({})", e))),
        FieldType::Email => {
            if email_regex().is_match(raw) {
                Ok(Value::Email(raw.to_string()))
            } else {
                Err((IssueKind::InvalidEmail, "expected an email address".to_string()))
            }
        }
        FieldType::Json => serde_json::from_str(raw)
            .map(Value::Json)
            .map_err(|e| (IssueKind::InvalidJson, format!("malformed JSON ({})", e))),
    }
}

fn parse_number(raw: &str) -> Result<Value, (IssueKind, String)> {
    let invalid = || (IssueKind::InvalidNumber, "expected a number".to_string());
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Value::Number(n)),
        _ => Err(invalid()),
    }
}

fn parse_boolean(raw: &str) -> Result<Value, (IssueKind, String)> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(Value::Boolean(true)),
        "false" | "0" => Ok(Value::Boolean(false)),
        _ => Err((
            IssueKind::InvalidBoolean,
            "expected one of: true, false, 1, 0".to_string(),
        )),
    }
}

fn parse_port(raw: &str) -> Result<Value, (IssueKind, String)> {
    match raw.trim().parse::<u32>() {
        Ok(port @ 1..=65535) => Ok(Value::Port(port as u16)),
        _ => Err((
            IssueKind::InvalidPort,
            "expected an integer port between 1 and 65535".to_string(),
        )),
    }
}

fn check_bounds(field: &CompiledField, value: Value) -> Result<Value, (IssueKind, String)> {
    if !field.has_bounds() {
        return Ok(value);
    }
    let n = match value.as_f64() {
        Some(n) => n,
        None => return Ok(value),
    };

    let below = field.min().map_or(false, |min| n < min);
    let above = field.max().map_or(false, |max| n > max);
    if !below && !above {
        return Ok(value);
    }

    let range = match (field.min(), field.max()) {
        (Some(min), Some(max)) => format!("[{}, {}]", min, max),
        (Some(min), None) => format!(">= {}", min),
        (None, Some(max)) => format!("<= {}", max),
        (None, None) => "unbounded".to_string(),
    };
    Err((IssueKind::OutOfRange, format!("must be within {}", range)))
}
