//! Error types for configuration resolution
//!
//! Field-level problems are collected as [`ValidationIssue`]s and surfaced
//! together inside one [`ValidationError`]. Schema, provider and policy
//! failures abort resolution immediately and are reported on their own.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::providers::ProviderError;

/// Kind of a field-level validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IssueKind {
    /// Required key absent from every provider and no default declared
    MissingRequired,
    /// Value is not one of the declared enum members
    InvalidEnum,
    /// Value does not parse as a finite number (or whole number)
    InvalidNumber,
    /// Numeric value outside the declared `min`/`max`
    OutOfRange,
    /// Value is not an integer in `1..=65535`
    InvalidPort,
    /// Value is not one of `true`/`false`/`1`/`0`
    InvalidBoolean,
    /// Value is not an absolute URL
    InvalidUrl,
    /// Value is not an email address
    InvalidEmail,
    /// Value is not well-formed JSON
    InvalidJson,
    /// Raw value does not match the declared pattern
    PatternMismatch,
    /// Key present in the merged environment but declared nowhere (strict mode)
    UnknownKey,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::MissingRequired => "MissingRequired",
            IssueKind::InvalidEnum => "InvalidEnum",
            IssueKind::InvalidNumber => "InvalidNumber",
            IssueKind::OutOfRange => "OutOfRange",
            IssueKind::InvalidPort => "InvalidPort",
            IssueKind::InvalidBoolean => "InvalidBoolean",
            IssueKind::InvalidUrl => "InvalidUrl",
            IssueKind::InvalidEmail => "InvalidEmail",
            IssueKind::InvalidJson => "InvalidJson",
            IssueKind::PatternMismatch => "PatternMismatch",
            IssueKind::UnknownKey => "UnknownKey",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single problem found while coercing one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// Key of the offending field
    pub key: String,
    /// What went wrong
    pub kind: IssueKind,
    /// Human-readable description of the violated rule
    pub message: String,
    /// Raw value that was rejected; never set for secret fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue without the offending value
    pub fn new(key: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind,
            message: message.into(),
            received: None,
        }
    }

    /// Attach the rejected raw value
    pub fn with_received(mut self, raw: impl Into<String>) -> Self {
        self.received = Some(raw.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.key, self.message, self.kind)?;
        if let Some(ref received) = self.received {
            write!(f, " (received {:?})", received)?;
        }
        Ok(())
    }
}

/// Every field-level issue found in one resolution
#[derive(Debug, Clone, PartialEq, Error)]
pub struct ValidationError {
    issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    /// All collected issues, in schema order
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Keys that have at least one issue
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for issue in &self.issues {
            if !keys.contains(&issue.key.as_str()) {
                keys.push(&issue.key);
            }
        }
        keys
    }

    /// Issues reported for one key
    pub fn issues_for(&self, key: &str) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.key == key).collect()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration ({} issue", self.issues.len())?;
        if self.issues.len() != 1 {
            f.write_str("s")?;
        }
        f.write_str(")")?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

/// Errors detected while compiling a schema declaration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// The declaration root is not a key -> rule mapping
    #[error("schema declaration must be a mapping of keys to rules, found {found}")]
    NotAMapping { found: String },

    /// A shorthand declaration could not be classified
    #[error("field `{key}`: cannot parse shorthand: {reason}")]
    InvalidShorthand { key: String, reason: String },

    /// A verbose declaration is malformed
    #[error("field `{key}`: invalid rule: {reason}")]
    InvalidRule { key: String, reason: String },

    /// The declared type is not part of the type vocabulary
    #[error("field `{key}`: unknown type `{name}`")]
    UnknownType { key: String, name: String },

    /// An enum with zero members
    #[error("field `{key}`: enum must have at least one member")]
    EmptyEnum { key: String },

    /// `min` greater than `max`
    #[error("field `{key}`: min ({min}) is greater than max ({max})")]
    InvalidBounds { key: String, min: f64, max: f64 },

    /// The pattern is not a valid regular expression
    #[error("field `{key}`: invalid pattern: {reason}")]
    InvalidPattern { key: String, reason: String },

    /// The default does not satisfy the field's own rule
    #[error("field `{key}`: default rejected: {reason}")]
    InvalidDefault { key: String, reason: String },

    /// The same key declared twice in one schema
    #[error("field `{key}` is declared more than once")]
    DuplicateKey { key: String },

    /// The schema document itself could not be parsed
    #[error("schema parse error: {0}")]
    Parse(String),
}

/// A file-backed provider supplied values where policy forbids it
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "provider `{provider}` is a file source and supplied {keys:?} in production; \
     dotenv sources are disallowed by policy"
)]
pub struct PolicyViolation {
    /// Name of the offending provider
    pub provider: String,
    /// Keys it supplied (values are never recorded)
    pub keys: Vec<String>,
}

/// Top-level error for a resolution call
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A key declared by two schemas with different rules
    #[error("key `{key}` is declared by more than one schema with conflicting rules")]
    DuplicateKey { key: String },

    /// A provider failed to load; resolution was aborted
    #[error("provider `{provider}` failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// `resolve_sync` met a provider that can only load asynchronously
    #[error("provider `{provider}` cannot load synchronously; resolve asynchronously or warm its cache first")]
    AsyncProviderInSyncContext { provider: String },
}

impl ResolveError {
    /// Field-level issues, empty for non-validation failures
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            ResolveError::Validation(err) => err.issues(),
            _ => &[],
        }
    }

    /// Short machine-friendly name of the failure class
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::Schema(_) => "SchemaError",
            ResolveError::DuplicateKey { .. } => "DuplicateKeyError",
            ResolveError::Provider { .. } => "ProviderError",
            ResolveError::Policy(_) => "PolicyViolation",
            ResolveError::Validation(_) => "ValidationError",
            ResolveError::AsyncProviderInSyncContext { .. } => "AsyncProviderInSyncContext",
        }
    }
}
