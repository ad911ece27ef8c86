//! Resolution pipeline
//!
//! A [`Resolver`] holds an ordered list of providers and the schemas they
//! are validated against. Resolving runs these steps:
//!
//! 1. Merge the compiled schemas; a key declared twice must have identical
//!    rules.
//! 2. Load every provider concurrently. The first failure aborts the call
//!    and names the provider.
//! 3. Apply the production policy, then merge the raw environments in
//!    declared order (later providers win, regardless of completion order).
//! 4. Optionally expand `${KEY}` references.
//! 5. Coerce every declared field, collecting every issue. In strict mode
//!    undeclared keys are reported too.
//!
//! # Example
//!
//! ```rust,ignore
//! use envsure_core::{Resolver, ResolveOptions, Schema};
//! use envsure_core::providers::{DotEnvProvider, EnvProvider};
//!
//! let config = Resolver::new()
//!     .with_provider(DotEnvProvider::optional(".env"))
//!     .with_source(EnvProvider::new(), Schema::compile(&schema)?)
//!     .with_options(ResolveOptions::from_env())
//!     .resolve()
//!     .await?;
//!
//! let port = config.get_port("PORT");
//! ```

mod merge;

use futures::future::try_join_all;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::coerce::coerce;
use crate::error::{IssueKind, ResolveError, ValidationError, ValidationIssue};
use crate::interpolate::interpolate_traced;
use crate::options::ResolveOptions;
use crate::providers::{Provider, RawEnv};
use crate::resolved::ResolvedConfig;
use crate::schema::Schema;

/// Result type for resolution
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Ordered providers plus the schemas they are validated against
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    providers: Vec<Arc<dyn Provider>>,
    schemas: Vec<Schema>,
    options: ResolveOptions,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a provider together with the schema it contributes
    pub fn with_source(self, provider: impl Provider + 'static, schema: Schema) -> Self {
        self.with_provider(provider).with_schema(schema)
    }

    /// Add a provider (builder pattern); later providers take precedence
    pub fn with_provider(self, provider: impl Provider + 'static) -> Self {
        self.with_arc_provider(Arc::new(provider))
    }

    /// Add an already shared provider
    pub fn with_arc_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Provider names in precedence order
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Resolve asynchronously
    pub async fn resolve(&self) -> Result<ResolvedConfig> {
        let schema = merge::merge_schemas(&self.schemas)?;

        let loads = self.providers.iter().map(|provider| async move {
            let started = Instant::now();
            let result = provider.load().await;
            debug!(
                provider = provider.name(),
                ok = result.is_ok(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "provider load finished"
            );
            result.map_err(|source| ResolveError::Provider {
                provider: provider.name().to_string(),
                source,
            })
        });

        let envs = try_join_all(loads).await?;
        self.finish(&schema, envs)
    }

    /// Resolve without awaiting
    ///
    /// Every provider must be able to answer synchronously; local providers
    /// can, and so can a cache wrapper holding a usable entry.
    pub fn resolve_sync(&self) -> Result<ResolvedConfig> {
        let schema = merge::merge_schemas(&self.schemas)?;

        let mut envs = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let loaded = provider
                .try_load_sync()
                .ok_or_else(|| ResolveError::AsyncProviderInSyncContext {
                    provider: provider.name().to_string(),
                })?;
            envs.push(loaded.map_err(|source| ResolveError::Provider {
                provider: provider.name().to_string(),
                source,
            })?);
        }

        self.finish(&schema, envs)
    }

    /// Resolve, returning failures as a value
    pub async fn resolve_safe(&self) -> Resolution {
        self.resolve().await.into()
    }

    /// Synchronous counterpart of [`Resolver::resolve_safe`]
    pub fn resolve_sync_safe(&self) -> Resolution {
        self.resolve_sync().into()
    }

    fn finish(&self, schema: &Schema, envs: Vec<RawEnv>) -> Result<ResolvedConfig> {
        if self.options.is_production() && !self.options.policies.allow_dotenv_in_production {
            if let Err(violation) = merge::check_policy(&self.providers, &envs) {
                warn!(
                    provider = %violation.provider,
                    keys = violation.keys.len(),
                    "file source rejected by production policy"
                );
                return Err(violation.into());
            }
        }

        let mut raw = merge::merge_envs(envs);
        let mut sources = HashMap::new();
        if self.options.interpolate {
            let expanded = interpolate_traced(&raw);
            raw = expanded.values;
            sources = expanded.sources;
        }

        let mut values = BTreeMap::new();
        let mut secrets = BTreeSet::new();
        let mut issues: Vec<ValidationIssue> = Vec::new();

        for field in schema.iter() {
            if field.is_secret() {
                secrets.insert(field.key().to_string());
            }
            match coerce(field, raw.get(field.key()).map(String::as_str)) {
                Ok(value) => {
                    values.insert(field.key().to_string(), value);
                }
                Err(found) if carries_secret(schema, sources.get(field.key())) => {
                    issues.extend(found.into_iter().map(|mut issue| {
                        issue.received = None;
                        issue
                    }));
                }
                Err(found) => issues.extend(found),
            }
        }

        if self.options.strict {
            let mut unknown: Vec<&String> = raw.keys().filter(|k| !schema.contains_key(k)).collect();
            unknown.sort();
            issues.extend(unknown.into_iter().map(|key| {
                ValidationIssue::new(
                    key.as_str(),
                    IssueKind::UnknownKey,
                    "key is not declared by any schema",
                )
            }));
        }

        if !issues.is_empty() {
            debug!(issues = issues.len(), "configuration rejected");
            return Err(ValidationError::new(issues).into());
        }

        info!(
            keys = values.len(),
            providers = ?self.provider_names(),
            "configuration resolved"
        );
        Ok(ResolvedConfig::new(values, secrets))
    }
}

/// Whether an interpolated value drew on a secret field
fn carries_secret(schema: &Schema, sources: Option<&BTreeSet<String>>) -> bool {
    sources.map_or(false, |keys| {
        keys.iter()
            .any(|key| schema.get(key).map_or(false, |field| field.is_secret()))
    })
}

/// Outcome of a safe resolution
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(ResolvedConfig),
    Failed(ResolveError),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    /// Field-level issues of a failed resolution
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Resolution::Resolved(_) => &[],
            Resolution::Failed(err) => err.issues(),
        }
    }

    pub fn config(&self) -> Option<&ResolvedConfig> {
        match self {
            Resolution::Resolved(config) => Some(config),
            Resolution::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ResolveError> {
        match self {
            Resolution::Resolved(_) => None,
            Resolution::Failed(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<ResolvedConfig> {
        match self {
            Resolution::Resolved(config) => Ok(config),
            Resolution::Failed(err) => Err(err),
        }
    }
}

impl From<Result<ResolvedConfig>> for Resolution {
    fn from(result: Result<ResolvedConfig>) -> Self {
        match result {
            Ok(config) => Resolution::Resolved(config),
            Err(err) => Resolution::Failed(err),
        }
    }
}

/// Resolve ordered (provider, schema declaration) pairs
///
/// Declarations are compiled before any provider is contacted.
pub async fn resolve<I>(sources: I, options: ResolveOptions) -> Result<ResolvedConfig>
where
    I: IntoIterator<Item = (Arc<dyn Provider>, JsonValue)>,
{
    let mut resolver = Resolver::new().with_options(options);
    for (provider, declaration) in sources {
        resolver = resolver
            .with_arc_provider(provider)
            .with_schema(Schema::compile(&declaration)?);
    }
    resolver.resolve().await
}
