//! Typed configuration values produced by coercion

use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;
use url::Url;

/// A coerced configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Integer(i64),
    Boolean(bool),
    Port(u16),
    Url(Url),
    Email(String),
    Json(JsonValue),
}

impl Value {
    /// Name of the field type that produced this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
            Value::Port(_) => "port",
            Value::Url(_) => "url",
            Value::Email(_) => "email",
            Value::Json(_) => "json",
        }
    }

    /// Borrow textual values (strings, emails, URLs)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Email(s) => Some(s),
            Value::Url(url) => Some(url.as_str()),
            _ => None,
        }
    }

    /// Numeric view of numbers, integers and ports
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            Value::Port(p) => Some(f64::from(*p)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Port(p) => Some(i64::from(*p)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_port(&self) -> Option<u16> {
        match self {
            Value::Port(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_url(&self) -> Option<&Url> {
        match self {
            Value::Url(url) => Some(url),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Value::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Convert into a JSON value
    ///
    /// Whole numbers declared as `number` are emitted as JSON integers so
    /// they deserialize into integer struct fields.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::String(s) | Value::Email(s) => JsonValue::String(s.clone()),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    JsonValue::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(JsonValue::Number)
                        .unwrap_or(JsonValue::Null)
                }
            }
            Value::Integer(i) => JsonValue::from(*i),
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Port(p) => JsonValue::from(*p),
            Value::Url(url) => JsonValue::String(url.to_string()),
            Value::Json(v) => v.clone(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::Email(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Port(p) => write!(f, "{}", p),
            Value::Url(url) => f.write_str(url.as_str()),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}
