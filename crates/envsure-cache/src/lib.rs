//! Caching decorator for envsure providers
//!
//! [`cached`] wraps any [`Provider`](envsure_core::Provider) so repeated
//! resolutions reuse one fetch per ttl window, optionally serving stale
//! values while a single background refresh runs.
//!
//! ```rust,ignore
//! use envsure_cache::{cached, CacheConfig};
//! use std::time::Duration;
//!
//! let secrets = cached(
//!     secrets_provider,
//!     CacheConfig::new(Duration::from_secs(300))
//!         .with_max_age(Duration::from_secs(3600))
//!         .with_stale_while_revalidate(true),
//! )?;
//! ```

pub mod config;
pub mod provider;
pub mod store;

pub use config::{CacheConfig, CacheError};
pub use provider::{cached, CacheStats, CachedProvider};
pub use store::{CacheState, CacheStore};
