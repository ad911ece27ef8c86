//! Classification of declared values into field rules
//!
//! Each declared value is inspected by shape and mapped to exactly one
//! [`FieldRule`]:
//!
//! | Declaration                 | Rule                                   |
//! |-----------------------------|----------------------------------------|
//! | `{ "type": "port", ... }`   | verbose rule                           |
//! | `"url"`                     | required `url`                         |
//! | `"url?"`                    | optional `url`                         |
//! | `"port:3000"`               | `port` defaulting to 3000              |
//! | `"anything else"`           | `string` defaulting to the literal     |
//! | `true` / `false`            | `boolean` with that default            |
//! | `42`                        | `number` with that default             |
//! | `["*dev", "prod"]`          | `string` enum, `*` marks the default   |

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use super::{json_kind, FieldRule, FieldType};
use crate::error::SchemaError;

/// Marker prefix for the default member of an enum shorthand
const DEFAULT_MARKER: char = '*';

/// Verbose declaration as written by the user
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VerboseRule {
    #[serde(rename = "type")]
    field_type: Option<String>,
    default: Option<JsonValue>,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    secret: bool,
    #[serde(rename = "enum")]
    choices: Option<Vec<String>>,
    pattern: Option<String>,
    min: Option<f64>,
    max: Option<f64>,
    description: Option<String>,
}

/// Map one declared value to a field rule
pub(super) fn classify(key: &str, declaration: &JsonValue) -> Result<FieldRule, SchemaError> {
    match declaration {
        JsonValue::Object(map) => verbose(key, map),
        JsonValue::String(text) => string_shorthand(key, text),
        JsonValue::Bool(b) => Ok(FieldRule::boolean().with_default(*b)),
        JsonValue::Number(n) => Ok(FieldRule::number().with_default(JsonValue::Number(n.clone()))),
        JsonValue::Array(items) => enum_shorthand(key, items),
        JsonValue::Null => Err(SchemaError::InvalidShorthand {
            key: key.to_string(),
            reason: "null does not declare a field".to_string(),
        }),
    }
}

fn verbose(key: &str, map: &Map<String, JsonValue>) -> Result<FieldRule, SchemaError> {
    let decl: VerboseRule = serde_json::from_value(JsonValue::Object(map.clone())).map_err(|e| {
        SchemaError::InvalidRule {
            key: key.to_string(),
            reason: e.to_string(),
        }
    })?;

    let field_type = match decl.field_type {
        Some(ref name) => FieldType::from_name(name).ok_or_else(|| SchemaError::UnknownType {
            key: key.to_string(),
            name: name.clone(),
        })?,
        None => infer_type(key, &decl)?,
    };

    Ok(FieldRule {
        field_type,
        default: decl.default,
        optional: decl.optional,
        secret: decl.secret,
        choices: decl.choices,
        pattern: decl.pattern,
        min: decl.min,
        max: decl.max,
        description: decl.description,
    })
}

/// Verbose rules may omit `type` when a default or enum makes it obvious
fn infer_type(key: &str, decl: &VerboseRule) -> Result<FieldType, SchemaError> {
    match (&decl.default, &decl.choices) {
        (Some(JsonValue::Bool(_)), _) => Ok(FieldType::Boolean),
        (Some(JsonValue::Number(_)), _) => Ok(FieldType::Number),
        (Some(JsonValue::String(_)), _) | (None, Some(_)) => Ok(FieldType::String),
        (Some(JsonValue::Array(_)), _) | (Some(JsonValue::Object(_)), _) => Ok(FieldType::Json),
        _ => Err(SchemaError::InvalidRule {
            key: key.to_string(),
            reason: "missing `type` and nothing to infer it from".to_string(),
        }),
    }
}

fn string_shorthand(key: &str, text: &str) -> Result<FieldRule, SchemaError> {
    if let Some(name) = text.strip_suffix('?') {
        return match FieldType::from_name(name) {
            Some(field_type) => Ok(FieldRule::new(field_type).optional()),
            None => Err(SchemaError::InvalidShorthand {
                key: key.to_string(),
                reason: format!("`{}?` marks an unknown type as optional", name),
            }),
        };
    }

    if let Some(field_type) = FieldType::from_name(text) {
        return Ok(FieldRule::new(field_type));
    }

    if let Some((name, default)) = text.split_once(':') {
        if let Some(field_type) = FieldType::from_name(name) {
            if default.is_empty() {
                return Err(SchemaError::InvalidShorthand {
                    key: key.to_string(),
                    reason: format!("`{}:` has an empty inline default", name),
                });
            }
            return Ok(FieldRule::new(field_type).with_default(default));
        }
    }

    Ok(FieldRule::string().with_default(text))
}

fn enum_shorthand(key: &str, items: &[JsonValue]) -> Result<FieldRule, SchemaError> {
    if items.is_empty() {
        return Err(SchemaError::EmptyEnum { key: key.to_string() });
    }

    let mut members = Vec::with_capacity(items.len());
    let mut default = None;

    for (position, item) in items.iter().enumerate() {
        let text = item.as_str().ok_or_else(|| SchemaError::InvalidShorthand {
            key: key.to_string(),
            reason: format!("enum members must be strings, found {}", json_kind(item)),
        })?;

        match text.strip_prefix(DEFAULT_MARKER) {
            Some(member) if position == 0 => {
                default = Some(member.to_string());
                members.push(member.to_string());
            }
            Some(_) => {
                return Err(SchemaError::InvalidShorthand {
                    key: key.to_string(),
                    reason: format!(
                        "only the first enum member may be marked default with `{}`",
                        DEFAULT_MARKER
                    ),
                })
            }
            None => members.push(text.to_string()),
        }
    }

    let rule = FieldRule::string().with_choices(members);
    Ok(match default {
        Some(default) => rule.with_default(default),
        None => rule,
    })
}
