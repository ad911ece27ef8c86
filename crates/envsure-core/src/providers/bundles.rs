//! Configuration Bundle Provider
//!
//! Loads a raw environment from a JSON, TOML or YAML document. Documents
//! are converted to JSON for uniform handling and nested tables are
//! flattened into keys joined by [`KEY_SEPARATOR`]:
//!
//! ```yaml
//! PORT: 8080
//! DATABASE:
//!   HOST: db.internal
//!   POOL: { MAX: 10 }
//! ```
//!
//! yields `PORT=8080`, `DATABASE__HOST=db.internal` and
//! `DATABASE__POOL__MAX=10`. Arrays are stored as JSON text so they can be
//! declared as `json` fields.
//!
//! # Example
//!
//! ```rust,ignore
//! use envsure_core::providers::{BundleFormat, BundleProvider};
//!
//! // Auto-detect format from the extension
//! let file = BundleProvider::from_file("config/app.toml")?;
//!
//! let inline = BundleProvider::inline(BundleFormat::Json, r#"{"PORT": 8080}"#);
//! ```

use super::traits::{Provider, ProviderError, ProviderResult, RawEnv, SourceKind};
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::{Path, PathBuf};

/// Separator between the segments of a flattened nested key
pub const KEY_SEPARATOR: &str = "__";

/// Document format of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFormat {
    Json,
    Toml,
    Yaml,
}

impl BundleFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "json" => Some(BundleFormat::Json),
            "toml" => Some(BundleFormat::Toml),
            "yaml" | "yml" => Some(BundleFormat::Yaml),
            _ => None,
        }
    }

    /// Parse a document into a JSON value
    pub fn parse(&self, content: &str) -> ProviderResult<JsonValue> {
        match self {
            BundleFormat::Json => {
                serde_json::from_str(content).map_err(|e| ProviderError::Parse(e.to_string()))
            }
            BundleFormat::Toml => toml::from_str::<toml::Value>(content)
                .map(toml_to_json)
                .map_err(|e| ProviderError::Parse(e.to_string())),
            BundleFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| ProviderError::Parse(e.to_string()))
            }
        }
    }
}

impl fmt::Display for BundleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleFormat::Json => write!(f, "json"),
            BundleFormat::Toml => write!(f, "toml"),
            BundleFormat::Yaml => write!(f, "yaml"),
        }
    }
}

#[derive(Debug, Clone)]
enum BundleSource {
    File(PathBuf),
    Inline(String),
}

/// Provider reading a JSON, TOML or YAML bundle
///
/// File bundles are re-read on every load.
#[derive(Debug, Clone)]
pub struct BundleProvider {
    name: String,
    format: BundleFormat,
    source: BundleSource,
}

impl BundleProvider {
    /// Create a provider from a file, auto-detecting format from its extension
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let format = BundleFormat::from_path(path).ok_or_else(|| {
            ProviderError::Unavailable(format!("unknown bundle format: {}", path.display()))
        })?;
        Ok(Self::from_file_with_format(path, format))
    }

    /// Create a provider from a file with an explicit format
    pub fn from_file_with_format(path: impl AsRef<Path>, format: BundleFormat) -> Self {
        Self {
            name: format!("bundle:{}", format),
            format,
            source: BundleSource::File(path.as_ref().to_path_buf()),
        }
    }

    /// Create a provider over an in-memory document
    pub fn inline(format: BundleFormat, content: impl Into<String>) -> Self {
        Self {
            name: format!("bundle:{}", format),
            format,
            source: BundleSource::Inline(content.into()),
        }
    }

    /// Override the provider name used in errors and logs
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn format(&self) -> BundleFormat {
        self.format
    }

    fn parse(&self, content: &str) -> ProviderResult<RawEnv> {
        match self.format.parse(content)? {
            JsonValue::Object(root) => {
                let mut env = RawEnv::new();
                flatten_object(&root, "", &mut env);
                Ok(env)
            }
            other => Err(ProviderError::Parse(format!(
                "bundle root must be a mapping, found {}",
                crate::schema::json_kind(&other)
            ))),
        }
    }
}

#[async_trait::async_trait]
impl Provider for BundleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        match self.source {
            BundleSource::File(_) => SourceKind::File,
            BundleSource::Inline(_) => SourceKind::Memory,
        }
    }

    async fn load(&self) -> ProviderResult<RawEnv> {
        match self.source {
            BundleSource::File(ref path) => {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| ProviderError::Io(format!("{}: {}", path.display(), e)))?;
                self.parse(&content)
            }
            BundleSource::Inline(ref content) => self.parse(content),
        }
    }

    fn try_load_sync(&self) -> Option<ProviderResult<RawEnv>> {
        let loaded = match self.source {
            BundleSource::File(ref path) => std::fs::read_to_string(path)
                .map_err(|e| ProviderError::Io(format!("{}: {}", path.display(), e)))
                .and_then(|content| self.parse(&content)),
            BundleSource::Inline(ref content) => self.parse(content),
        };
        Some(loaded)
    }
}

/// Flatten nested objects into separator-joined keys
fn flatten_object(obj: &serde_json::Map<String, JsonValue>, prefix: &str, result: &mut RawEnv) {
    for (key, value) in obj {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}{}{}", prefix, KEY_SEPARATOR, key)
        };

        match value {
            JsonValue::Object(nested) => flatten_object(nested, &full_key, result),
            // Null means "not supplied"
            JsonValue::Null => {}
            JsonValue::String(s) => {
                result.insert(full_key, s.clone());
            }
            other => {
                result.insert(full_key, other.to_string());
            }
        }
    }
}

/// Convert a TOML value to a JSON value
pub(crate) fn toml_to_json(toml: toml::Value) -> JsonValue {
    match toml {
        toml::Value::String(s) => JsonValue::String(s),
        toml::Value::Integer(i) => JsonValue::Number(serde_json::Number::from(i)),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        toml::Value::Boolean(b) => JsonValue::Bool(b),
        toml::Value::Array(arr) => JsonValue::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => JsonValue::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
        toml::Value::Datetime(dt) => JsonValue::String(dt.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_json_bundle_flattens_nested_keys() {
        let provider = BundleProvider::inline(
            BundleFormat::Json,
            r#"{
                "PORT": 8080,
                "DEBUG": true,
                "DATABASE": {
                    "HOST": "db.internal",
                    "POOL": { "MAX": 10 }
                },
                "HOSTS": ["a", "b"],
                "UNSET": null
            }"#,
        );

        let env = provider.load().await.unwrap();
        assert_eq!(env["PORT"], "8080");
        assert_eq!(env["DEBUG"], "true");
        assert_eq!(env["DATABASE__HOST"], "db.internal");
        assert_eq!(env["DATABASE__POOL__MAX"], "10");
        assert_eq!(env["HOSTS"], r#"["a","b"]"#);
        assert!(!env.contains_key("UNSET"));
        assert_eq!(provider.kind(), SourceKind::Memory);
    }

    #[tokio::test]
    async fn test_toml_bundle() {
        let provider = BundleProvider::inline(
            BundleFormat::Toml,
            r#"
            APP_NAME = "billing"

            [DATABASE]
            PORT = 5432
            "#,
        );

        let env = provider.load().await.unwrap();
        assert_eq!(env["APP_NAME"], "billing");
        assert_eq!(env["DATABASE__PORT"], "5432");
    }

    #[tokio::test]
    async fn test_yaml_bundle_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "REDIS:\n  URL: redis://cache:6379\nWORKERS: 4").unwrap();

        let provider = BundleProvider::from_file(file.path()).unwrap();
        assert_eq!(provider.format(), BundleFormat::Yaml);
        assert_eq!(provider.kind(), SourceKind::File);

        let env = provider.load().await.unwrap();
        assert_eq!(env["REDIS__URL"], "redis://cache:6379");
        assert_eq!(env["WORKERS"], "4");

        let sync = provider.try_load_sync().unwrap().unwrap();
        assert_eq!(sync, env);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let result = BundleProvider::from_file("settings.ini");
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_non_mapping_root_rejected() {
        let provider = BundleProvider::inline(BundleFormat::Json, "[1, 2]");
        assert!(matches!(provider.load().await, Err(ProviderError::Parse(_))));
    }

    #[tokio::test]
    async fn test_malformed_document() {
        let provider = BundleProvider::inline(BundleFormat::Toml, "PORT = ").with_name("app.toml");
        assert_eq!(provider.name(), "app.toml");
        assert!(matches!(provider.load().await, Err(ProviderError::Parse(_))));
    }
}
