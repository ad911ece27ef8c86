//! Cache configuration

use std::time::Duration;
use thiserror::Error;

/// Errors in a cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("ttl must be greater than zero")]
    ZeroTtl,

    #[error("max_age ({max_age:?}) must not be shorter than ttl ({ttl:?})")]
    MaxAgeBelowTtl { ttl: Duration, max_age: Duration },

    #[error("cache key must not be empty")]
    EmptyKey,
}

/// Freshness settings for one cached provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a fetched value is served without any I/O
    pub ttl: Duration,
    /// Total age after which a value is never served
    pub max_age: Option<Duration>,
    /// Serve stale values while one background refresh runs
    pub stale_while_revalidate: bool,
    /// Entry key; defaults to the wrapped provider's name
    pub key: Option<String>,
}

impl CacheConfig {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_age: None,
            stale_while_revalidate: false,
            key: None,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn with_stale_while_revalidate(mut self, enabled: bool) -> Self {
        self.stale_while_revalidate = enabled;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.ttl.is_zero() {
            return Err(CacheError::ZeroTtl);
        }
        if let Some(max_age) = self.max_age {
            if max_age < self.ttl {
                return Err(CacheError::MaxAgeBelowTtl {
                    ttl: self.ttl,
                    max_age,
                });
            }
        }
        if matches!(self.key.as_deref(), Some("")) {
            return Err(CacheError::EmptyKey);
        }
        Ok(())
    }
}
