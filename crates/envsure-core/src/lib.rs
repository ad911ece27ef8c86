//! envsure core: schema-driven configuration resolution
//!
//! Resolves configuration from ordered providers (process environment,
//! `.env` files, config bundles, secret stores), validates and coerces every
//! declared key, and returns an immutable typed [`ResolvedConfig`] or one
//! error listing every problem at once.
//!
//! ```rust,ignore
//! use envsure_core::{providers::EnvProvider, Resolver, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::compile(&json!({
//!     "PORT": "port:3000",
//!     "DATABASE_URL": "url",
//!     "API_KEY": { "type": "string", "secret": true },
//! }))?;
//!
//! let config = Resolver::new()
//!     .with_source(EnvProvider::new(), schema)
//!     .resolve()
//!     .await?;
//! ```
//!
//! Provider caching lives in the `envsure-cache` crate.

pub mod coerce;
pub mod error;
pub mod handle;
pub mod interpolate;
pub mod logging;
pub mod options;
pub mod providers;
pub mod resolve;
pub mod resolved;
pub mod schema;
pub mod value;

pub use coerce::coerce;
pub use error::{
    IssueKind, PolicyViolation, ResolveError, SchemaError, ValidationError, ValidationIssue,
};
pub use handle::ConfigHandle;
pub use options::{Policies, ResolveOptions};
pub use providers::{Provider, ProviderError, ProviderResult, RawEnv, SourceKind};
pub use resolve::{resolve, Resolution, Resolver};
pub use resolved::ResolvedConfig;
pub use schema::{CompiledField, FieldRule, FieldType, Schema, SchemaBuilder};
pub use value::Value;
