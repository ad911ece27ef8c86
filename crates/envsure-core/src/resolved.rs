//! The immutable result of a successful resolution

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use url::Url;

use crate::value::Value;

/// Placeholder printed instead of secret values
const REDACTED: &str = "<redacted>";

/// Typed configuration produced by a resolution call
///
/// Every declared key is present; absent optional keys without a default map
/// to `None`. The value is never mutated after construction and can be
/// shared freely behind an `Arc`.
#[derive(Clone, PartialEq)]
pub struct ResolvedConfig {
    values: BTreeMap<String, Option<Value>>,
    secrets: BTreeSet<String>,
}

impl ResolvedConfig {
    pub(crate) fn new(values: BTreeMap<String, Option<Value>>, secrets: BTreeSet<String>) -> Self {
        Self { values, secrets }
    }

    /// Typed value of a key; `None` if undeclared or absent
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)?.as_ref()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_f64()
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.as_i64()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    pub fn get_port(&self, key: &str) -> Option<u16> {
        self.get(key)?.as_port()
    }

    pub fn get_url(&self, key: &str) -> Option<&Url> {
        self.get(key)?.as_url()
    }

    pub fn get_json(&self, key: &str) -> Option<&JsonValue> {
        self.get(key)?.as_json()
    }

    /// Whether the key was declared by any schema, present or not
    pub fn is_declared(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_secret(&self, key: &str) -> bool {
        self.secrets.contains(key)
    }

    /// Declared keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Declared keys with their values, absent optionals included
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// JSON object of every declared key; absent optionals are `null`
    ///
    /// Secret values are included. Use `{:?}` for a redacted view.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.as_ref().map_or(JsonValue::Null, Value::to_json)))
                .collect(),
        )
    }

    /// Deserialize into an application struct
    ///
    /// Absent optional keys are omitted so `#[serde(default)]` applies.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let object: Map<String, JsonValue> = self
            .values
            .iter()
            .filter_map(|(k, v)| Some((k.clone(), v.as_ref()?.to_json())))
            .collect();
        serde_json::from_value(JsonValue::Object(object))
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.values {
            match value {
                Some(_) if self.secrets.contains(key) => map.entry(key, &REDACTED),
                Some(value) => map.entry(key, value),
                None => map.entry(key, &None::<()>),
            };
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn sample() -> ResolvedConfig {
        let mut values = BTreeMap::new();
        values.insert("PORT".to_string(), Some(Value::Port(8080)));
        values.insert("DEBUG".to_string(), Some(Value::Boolean(true)));
        values.insert(
            "DATABASE_URL".to_string(),
            Some(Value::Url(Url::parse("postgres://db:5432/app").unwrap())),
        );
        values.insert("API_KEY".to_string(), Some(Value::String("sk_live_123".into())));
        values.insert("SENTRY_DSN".to_string(), None);
        ResolvedConfig::new(values, BTreeSet::from(["API_KEY".to_string()]))
    }

    #[test]
    fn test_typed_accessors() {
        let config = sample();
        assert_eq!(config.get_port("PORT"), Some(8080));
        assert_eq!(config.get_i64("PORT"), Some(8080));
        assert_eq!(config.get_bool("DEBUG"), Some(true));
        assert_eq!(config.get_url("DATABASE_URL").unwrap().host_str(), Some("db"));
        assert_eq!(config.get_str("API_KEY"), Some("sk_live_123"));
        assert_eq!(config.get_bool("PORT"), None);
    }

    #[test]
    fn test_absent_optional_is_declared() {
        let config = sample();
        assert!(config.is_declared("SENTRY_DSN"));
        assert!(config.get("SENTRY_DSN").is_none());
        assert!(!config.is_declared("UNKNOWN"));
        assert_eq!(config.len(), 5);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", sample());
        assert!(!debug.contains("sk_live_123"));
        assert!(debug.contains(REDACTED));
        assert!(debug.contains("8080"));
    }

    #[test]
    fn test_to_json() {
        let json = sample().to_json();
        assert_eq!(json["PORT"], 8080);
        assert_eq!(json["DATABASE_URL"], "postgres://db:5432/app");
        assert!(json["SENTRY_DSN"].is_null());
    }

    #[test]
    fn test_deserialize_into_struct() {
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        struct AppConfig {
            port: u16,
            debug: bool,
            database_url: String,
            #[serde(default)]
            sentry_dsn: Option<String>,
        }

        let app: AppConfig = sample().deserialize().unwrap();
        assert_eq!(app.port, 8080);
        assert!(app.debug);
        assert_eq!(app.database_url, "postgres://db:5432/app");
        assert!(app.sentry_dsn.is_none());
    }
}
