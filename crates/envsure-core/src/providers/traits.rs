//! Core trait for configuration providers
//!
//! A provider produces a raw key -> string mapping. Providers are black
//! boxes to the resolution pipeline: they do not retry, cache or validate.
//! Caching is layered on top by the cache wrapper and validation happens in
//! the pipeline.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Raw environment produced by one provider
pub type RawEnv = HashMap<String, String>;

/// Errors that can occur when loading from a provider
///
/// Errors are `Clone` so one failed fetch can be handed to every caller
/// waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The source is not available or not configured
    #[error("source not available: {0}")]
    Unavailable(String),

    /// Authentication or authorization failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Network or connection error (for remote providers)
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// I/O error (for file-based providers)
    #[error("I/O error: {0}")]
    Io(String),

    /// The source content could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// Timeout error
    #[error("timeout: {0}")]
    Timeout(String),

    /// Generic provider error
    #[error("provider error: {0}")]
    Other(String),
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::Io(err.to_string())
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Where a provider's values come from
///
/// The production policy gate treats [`SourceKind::File`] (dotenv and
/// bundle files) as lower trust than the process environment or a secret
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// The process environment
    Process,
    /// A local file such as `.env` or a config bundle
    File,
    /// A remote secret store or service
    Remote,
    /// Values held in memory
    Memory,
}

impl SourceKind {
    pub fn is_file(&self) -> bool {
        matches!(self, SourceKind::File)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Process => write!(f, "process"),
            SourceKind::File => write!(f, "file"),
            SourceKind::Remote => write!(f, "remote"),
            SourceKind::Memory => write!(f, "memory"),
        }
    }
}

/// Capability contract for configuration sources
///
/// # Async Design
///
/// `load` is async to support remote providers without blocking. Local
/// providers also implement [`Provider::try_load_sync`] so they can take
/// part in synchronous resolution.
#[async_trait::async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    /// Returns the name of this provider, used in errors and logs
    fn name(&self) -> &str;

    /// Kind of source, consulted by the production policy
    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    /// Load the complete raw environment
    async fn load(&self) -> ProviderResult<RawEnv>;

    /// Load without awaiting, when the provider can answer immediately
    ///
    /// Returns `None` for providers that can only load asynchronously.
    fn try_load_sync(&self) -> Option<ProviderResult<RawEnv>> {
        None
    }
}

#[async_trait::async_trait]
impl<P: Provider + ?Sized> Provider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn kind(&self) -> SourceKind {
        (**self).kind()
    }

    async fn load(&self) -> ProviderResult<RawEnv> {
        (**self).load().await
    }

    fn try_load_sync(&self) -> Option<ProviderResult<RawEnv>> {
        (**self).try_load_sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Remote;

    #[async_trait::async_trait]
    impl Provider for Remote {
        fn name(&self) -> &str {
            "remote"
        }

        async fn load(&self) -> ProviderResult<RawEnv> {
            Ok(RawEnv::from([("TOKEN".to_string(), "abc".to_string())]))
        }
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::ConnectionError("secrets endpoint unreachable".into());
        assert!(err.to_string().contains("secrets endpoint unreachable"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing .env");
        let err: ProviderError = io.into();
        assert!(matches!(err, ProviderError::Io(ref msg) if msg.contains("missing .env")));
    }

    #[test]
    fn test_defaults_are_async_remote() {
        let provider = Remote;
        assert_eq!(provider.kind(), SourceKind::Remote);
        assert!(provider.try_load_sync().is_none());
    }

    #[tokio::test]
    async fn test_arc_delegates() {
        let provider: Arc<dyn Provider> = Arc::new(Remote);
        let wrapped = Arc::new(provider);
        assert_eq!(wrapped.name(), "remote");
        let env = wrapped.load().await.unwrap();
        assert_eq!(env.get("TOKEN").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_source_kind_display() {
        assert_eq!(SourceKind::File.to_string(), "file");
        assert!(SourceKind::File.is_file());
        assert!(!SourceKind::Process.is_file());
    }
}
