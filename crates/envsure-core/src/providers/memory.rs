//! In-memory providers
//!
//! [`StaticProvider`] serves a fixed map and is mostly used for defaults,
//! overrides and tests. [`FnProvider`] adapts an async closure, which is the
//! quickest way to plug in a secret store client.

use super::traits::{Provider, ProviderResult, RawEnv, SourceKind};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Provider over a fixed set of values
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    kind: SourceKind,
    values: RawEnv,
}

impl StaticProvider {
    pub fn new<I, K, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            kind: SourceKind::Memory,
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Report a different source kind to the policy gate
    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn values(&self) -> &RawEnv {
        &self.values
    }
}

#[async_trait::async_trait]
impl Provider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn load(&self) -> ProviderResult<RawEnv> {
        Ok(self.values.clone())
    }

    fn try_load_sync(&self) -> Option<ProviderResult<RawEnv>> {
        Some(Ok(self.values.clone()))
    }
}

type LoadFn = dyn Fn() -> BoxFuture<'static, ProviderResult<RawEnv>> + Send + Sync;

/// Provider backed by an async closure
///
/// ```rust,ignore
/// let secrets = FnProvider::new("vault", move || {
///     let client = client.clone();
///     async move { client.read_all("app/prod").await }
/// });
/// ```
#[derive(Clone)]
pub struct FnProvider {
    name: String,
    kind: SourceKind,
    load: Arc<LoadFn>,
}

impl FnProvider {
    pub fn new<F, Fut>(name: impl Into<String>, load: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ProviderResult<RawEnv>> + Send + 'static,
    {
        Self {
            name: name.into(),
            kind: SourceKind::Remote,
            load: Arc::new(move || -> BoxFuture<'static, ProviderResult<RawEnv>> {
                Box::pin(load())
            }),
        }
    }

    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }
}

impl fmt::Debug for FnProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProvider")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Provider for FnProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn load(&self) -> ProviderResult<RawEnv> {
        (self.load)().await
    }
}
