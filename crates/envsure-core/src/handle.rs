//! Caller-owned, resolve-once configuration handle
//!
//! ```rust,ignore
//! static CONFIG: OnceLock<ConfigHandle> = OnceLock::new();
//!
//! let handle = ConfigHandle::new(resolver);
//! let config = handle.get_or_resolve().await?;
//! // Later, without awaiting:
//! let port = handle.get().and_then(|c| c.get_port("PORT"));
//! ```

use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::resolve::{Resolver, Result};
use crate::resolved::ResolvedConfig;

/// Resolves a [`Resolver`] at most once and shares the result
///
/// Concurrent first callers wait on the same resolution. A failed
/// resolution is not stored; the next call tries again.
#[derive(Debug)]
pub struct ConfigHandle {
    resolver: Resolver,
    cell: OnceCell<Arc<ResolvedConfig>>,
}

impl ConfigHandle {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            cell: OnceCell::new(),
        }
    }

    /// Resolve on first use, then return the stored configuration
    pub async fn get_or_resolve(&self) -> Result<Arc<ResolvedConfig>> {
        self.cell
            .get_or_try_init(|| async { self.resolver.resolve().await.map(Arc::new) })
            .await
            .cloned()
    }

    /// The configuration, if it has been resolved
    pub fn get(&self) -> Option<Arc<ResolvedConfig>> {
        self.cell.get().cloned()
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.initialized()
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }
}
