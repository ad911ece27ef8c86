//! Configuration Providers
//!
//! A provider is anything that can produce a raw key -> string mapping on
//! demand. Resolution loads every provider concurrently and merges their
//! output in declaration order.
//!
//! # Supported Providers
//!
//! - **Environment Variables**: the process environment and `.env` files
//! - **Config Bundles**: JSON, TOML and YAML documents
//! - **In-memory**: fixed maps and async closures for custom stores
//!
//! # Example
//!
//! ```rust,ignore
//! use envsure_core::providers::{DotEnvProvider, EnvProvider, FnProvider};
//!
//! let dotenv = DotEnvProvider::optional(".env");
//! let env = EnvProvider::new();
//! let secrets = FnProvider::new("secrets", || async { fetch_secrets().await });
//! ```

pub mod traits;
pub mod env;
pub mod bundles;
pub mod memory;

// Re-export core types
pub use traits::{Provider, ProviderError, ProviderResult, RawEnv, SourceKind};

// Re-export provider implementations
pub use env::{DotEnvProvider, EnvProvider};
pub use bundles::{BundleFormat, BundleProvider};
pub use memory::{FnProvider, StaticProvider};
