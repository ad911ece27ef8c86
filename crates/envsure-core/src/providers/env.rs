//! Environment Variable Providers
//!
//! This module provides adapters for loading configuration from:
//! - Raw process environment variables
//! - `.env` files
//!
//! # Example
//!
//! ```rust,ignore
//! use envsure_core::providers::{EnvProvider, DotEnvProvider};
//!
//! // Only variables starting with MYAPP_, with the prefix stripped
//! let env = EnvProvider::with_prefix("MYAPP_");
//!
//! // A .env file that may not exist on every machine
//! let dotenv = DotEnvProvider::optional(".env");
//! ```

use super::traits::{Provider, ProviderError, ProviderResult, RawEnv, SourceKind};
use std::path::{Path, PathBuf};

/// Provider for process environment variables
///
/// Reflects the environment at load time. Variables whose name or value is
/// not valid UTF-8 are skipped.
#[derive(Debug, Clone, Default)]
pub struct EnvProvider {
    prefix: Option<String>,
}

impl EnvProvider {
    /// Read every environment variable
    pub fn new() -> Self {
        Self::default()
    }

    /// Read only variables starting with `prefix`, stripping it from keys
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn snapshot(&self) -> RawEnv {
        std::env::vars_os()
            .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
            .filter_map(|(name, value)| match self.prefix {
                Some(ref prefix) => name
                    .strip_prefix(prefix.as_str())
                    .filter(|key| !key.is_empty())
                    .map(|key| (key.to_string(), value)),
                None => Some((name, value)),
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Provider for EnvProvider {
    fn name(&self) -> &str {
        "env"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Process
    }

    async fn load(&self) -> ProviderResult<RawEnv> {
        Ok(self.snapshot())
    }

    fn try_load_sync(&self) -> Option<ProviderResult<RawEnv>> {
        Some(Ok(self.snapshot()))
    }
}

/// Provider for `.env` files
///
/// The file is read on every load; wrap the provider in a cache to avoid
/// repeated reads.
///
/// # File Format
///
/// ```text
/// # Comment
/// KEY=value
/// export OTHER=value
/// QUOTED="value with spaces\nand an escaped newline"
/// LITERAL='no $escapes\n here'
/// INLINE=value # trailing comment
/// ```
#[derive(Debug, Clone)]
pub struct DotEnvProvider {
    path: PathBuf,
    /// Treat a missing file as an empty environment
    optional: bool,
}

impl DotEnvProvider {
    /// Create a provider for a file that must exist at load time
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            optional: false,
        }
    }

    /// Create a provider for a file that may be absent
    pub fn optional(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            optional: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_result(&self, read: std::io::Result<String>) -> ProviderResult<RawEnv> {
        match read {
            Ok(content) => parse_dotenv(&content),
            Err(e) if self.optional && e.kind() == std::io::ErrorKind::NotFound => Ok(RawEnv::new()),
            Err(e) => Err(ProviderError::Io(format!("{}: {}", self.path.display(), e))),
        }
    }
}

#[async_trait::async_trait]
impl Provider for DotEnvProvider {
    fn name(&self) -> &str {
        "dotenv"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    async fn load(&self) -> ProviderResult<RawEnv> {
        self.read_result(tokio::fs::read_to_string(&self.path).await)
    }

    fn try_load_sync(&self) -> Option<ProviderResult<RawEnv>> {
        Some(self.read_result(std::fs::read_to_string(&self.path)))
    }
}

/// Parse `.env` content into a raw environment
pub fn parse_dotenv(content: &str) -> ProviderResult<RawEnv> {
    let mut env = RawEnv::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

        let (key, value) = line.split_once('=').ok_or_else(|| {
            ProviderError::Parse(format!("line {}: expected KEY=value", index + 1))
        })?;

        let key = key.trim();
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(ProviderError::Parse(format!("line {}: invalid key", index + 1)));
        }

        env.insert(key.to_string(), parse_value(value.trim()));
    }

    Ok(env)
}

fn parse_value(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return unescape(&value[1..value.len() - 1]);
    }

    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }

    // Unquoted values end at an inline comment
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end().to_string(),
        None => value.to_string(),
    }
}

/// Expand backslash escapes inside a double-quoted value, left to right
fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
