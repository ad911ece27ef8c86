//! Schema declaration and compilation
//!
//! A schema maps configuration keys to field rules. Rules can be declared
//! programmatically with [`FieldRule`] and [`SchemaBuilder`], or from a
//! JSON/TOML/YAML document using either the verbose object form or the
//! shorthand literals understood by [`shorthand`]. Every path ends in the
//! same compilation step, so malformed rules fail before any provider is
//! contacted.
//!
//! # Example
//!
//! ```rust
//! use envsure_core::schema::Schema;
//! use serde_json::json;
//!
//! let schema = Schema::compile(&json!({
//!     "PORT": { "type": "port", "default": 3000 },
//!     "DATABASE_URL": "url",
//!     "LOG_FORMAT": ["*text", "json"],
//!     "SENTRY_DSN": "url?",
//! })).unwrap();
//!
//! assert_eq!(schema.len(), 4);
//! ```

mod shorthand;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;

use crate::coerce::coerce;
use crate::error::SchemaError;
use crate::providers::bundles::toml_to_json;
use crate::value::Value;

/// Type vocabulary for configuration fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Port,
    Url,
    Email,
    Json,
}

impl FieldType {
    pub const ALL: [FieldType; 8] = [
        FieldType::String,
        FieldType::Number,
        FieldType::Integer,
        FieldType::Boolean,
        FieldType::Port,
        FieldType::Url,
        FieldType::Email,
        FieldType::Json,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Port => "port",
            FieldType::Url => "url",
            FieldType::Email => "email",
            FieldType::Json => "json",
        }
    }

    /// Look up a type by its declared name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number | FieldType::Integer | FieldType::Port)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of a single configuration key
///
/// A field with a default is implicitly optional. Defaults are given as JSON
/// literals and are coerced through the field's own rule at compile time.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    /// Expected field type
    pub field_type: FieldType,
    /// Default used when no provider supplies the key
    pub default: Option<JsonValue>,
    /// Whether the key may be absent
    pub optional: bool,
    /// Whether the value must be kept out of errors and logs
    pub secret: bool,
    /// Allowed raw values, compared case-sensitively
    pub choices: Option<Vec<String>>,
    /// Regular expression the raw value must match
    pub pattern: Option<String>,
    /// Inclusive lower bound for numeric types
    pub min: Option<f64>,
    /// Inclusive upper bound for numeric types
    pub max: Option<f64>,
    /// Human-readable description
    pub description: Option<String>,
}

impl FieldRule {
    /// Create a required field of the given type
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            default: None,
            optional: false,
            secret: false,
            choices: None,
            pattern: None,
            min: None,
            max: None,
            description: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn port() -> Self {
        Self::new(FieldType::Port)
    }

    pub fn url() -> Self {
        Self::new(FieldType::Url)
    }

    pub fn email() -> Self {
        Self::new(FieldType::Email)
    }

    pub fn json() -> Self {
        Self::new(FieldType::Json)
    }

    /// Set a default value
    pub fn with_default(mut self, default: impl Into<JsonValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Mark as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark as secret
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Restrict to a set of allowed values
    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Require the raw value to match a regular expression
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate the declaration and produce the rule used at resolution time
    pub fn compile(&self, key: &str) -> Result<CompiledField, SchemaError> {
        if let Some(ref choices) = self.choices {
            if choices.is_empty() {
                return Err(SchemaError::EmptyEnum { key: key.to_string() });
            }
        }

        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(SchemaError::InvalidBounds {
                    key: key.to_string(),
                    min,
                    max,
                });
            }
        }

        let pattern = match self.pattern {
            Some(ref source) => Some(Regex::new(source).map_err(|e| SchemaError::InvalidPattern {
                key: key.to_string(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        let mut field = CompiledField {
            key: key.to_string(),
            field_type: self.field_type,
            default: None,
            optional: self.optional || self.default.is_some(),
            secret: self.secret,
            choices: self.choices.clone(),
            pattern,
            min: self.min,
            max: self.max,
            description: self.description.clone(),
            declaration: self.clone(),
        };

        if let Some(ref default) = self.default {
            field.default = Some(compile_default(&field, default)?);
        }

        Ok(field)
    }
}

/// Coerce a declared default through the field's own rule
fn compile_default(field: &CompiledField, default: &JsonValue) -> Result<Value, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidDefault {
        key: field.key.clone(),
        reason,
    };

    let raw = match (field.field_type, default) {
        (FieldType::Json, JsonValue::String(text)) => text.clone(),
        (FieldType::Json, other) => return Ok(Value::Json(other.clone())),
        (_, JsonValue::String(text)) => text.clone(),
        (_, JsonValue::Number(n)) => n.to_string(),
        (_, JsonValue::Bool(b)) => b.to_string(),
        (field_type, other) => {
            return Err(invalid(format!(
                "a {} literal cannot default a {} field",
                json_kind(other),
                field_type
            )))
        }
    };

    match coerce(field, Some(&raw)) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(invalid("default produced no value".to_string())),
        Err(issues) => Err(invalid(
            issues
                .iter()
                .map(|i| i.message.clone())
                .collect::<Vec<_>>()
                .join("; "),
        )),
    }
}

pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// A validated field rule, ready for coercion
#[derive(Debug, Clone)]
pub struct CompiledField {
    key: String,
    field_type: FieldType,
    default: Option<Value>,
    optional: bool,
    secret: bool,
    choices: Option<Vec<String>>,
    pattern: Option<Regex>,
    min: Option<f64>,
    max: Option<f64>,
    description: Option<String>,
    declaration: FieldRule,
}

impl CompiledField {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// True when the key may be absent (explicitly optional or defaulted)
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    pub fn choices(&self) -> Option<&[String]> {
        self.choices.as_deref()
    }

    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The declaration this field was compiled from
    pub fn declaration(&self) -> &FieldRule {
        &self.declaration
    }

    /// Whether `other` validates exactly like this field
    ///
    /// Compares the compiled rule, so a shorthand and a verbose declaration
    /// of the same rule are equal. Descriptions are ignored.
    pub fn same_rule(&self, other: &CompiledField) -> bool {
        self.key == other.key
            && self.field_type == other.field_type
            && self.default == other.default
            && self.optional == other.optional
            && self.secret == other.secret
            && self.choices == other.choices
            && self.pattern.as_ref().map(Regex::as_str) == other.pattern.as_ref().map(Regex::as_str)
            && self.min == other.min
            && self.max == other.max
    }

    pub(crate) fn has_bounds(&self) -> bool {
        self.field_type.is_numeric() && (self.min.is_some() || self.max.is_some())
    }
}

/// A compiled, immutable set of field rules
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<CompiledField>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Start a programmatic schema
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Compile a declaration given as a JSON mapping of key -> rule
    pub fn compile(declaration: &JsonValue) -> Result<Self, SchemaError> {
        let map = match declaration {
            JsonValue::Object(map) => map,
            other => {
                return Err(SchemaError::NotAMapping {
                    found: json_kind(other).to_string(),
                })
            }
        };

        let mut builder = SchemaBuilder::new();
        for (key, rule) in map {
            builder = builder.field(key.clone(), shorthand::classify(key, rule)?);
        }
        builder.build()
    }

    /// Compile a JSON document
    pub fn from_json_str(content: &str) -> Result<Self, SchemaError> {
        let value: JsonValue =
            serde_json::from_str(content).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::compile(&value)
    }

    /// Compile a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, SchemaError> {
        let value: toml::Value =
            toml::from_str(content).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::compile(&toml_to_json(value))
    }

    /// Compile a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self, SchemaError> {
        let value: JsonValue =
            serde_yaml::from_str(content).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::compile(&value)
    }

    pub fn get(&self, key: &str) -> Option<&CompiledField> {
        self.index.get(key).map(|&i| &self.fields[i])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Fields in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &CompiledField> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Append a compiled field; the caller guarantees the key is new
    pub(crate) fn push(&mut self, field: CompiledField) {
        self.index.insert(field.key.clone(), self.fields.len());
        self.fields.push(field);
    }
}

/// Builder collecting field declarations in order
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<(String, FieldRule)>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field (builder pattern)
    pub fn field(mut self, key: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.push((key.into(), rule));
        self
    }

    /// Compile every declaration, failing on the first schema error
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut schema = Schema::default();
        for (key, rule) in self.fields {
            if schema.contains_key(&key) {
                return Err(SchemaError::DuplicateKey { key });
            }
            let field = rule.compile(&key)?;
            schema.push(field);
        }
        Ok(schema)
    }
}
