//! Shared cache entries

use envsure_core::providers::{ProviderError, RawEnv};
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// One fetch shared by every caller that joined it
pub(crate) type SharedFetch = Shared<BoxFuture<'static, Result<Arc<RawEnv>, ProviderError>>>;

/// Observable state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing usable is cached
    Empty,
    /// Cached value is within its ttl
    Fresh,
    /// Cached value is past its ttl but still servable
    Stale,
    /// A fetch is in flight
    Refreshing,
}

pub(crate) struct Inflight {
    pub(crate) id: u64,
    pub(crate) fetch: SharedFetch,
}

#[derive(Default)]
pub(crate) struct Entry {
    pub(crate) value: Option<Arc<RawEnv>>,
    pub(crate) fetched_at: Option<Instant>,
    pub(crate) inflight: Option<Inflight>,
    pub(crate) last_id: u64,
}

impl Entry {
    /// Cached value with its age, if any
    pub(crate) fn aged_value(&self, now: Instant) -> Option<(Arc<RawEnv>, Duration)> {
        let value = self.value.clone()?;
        let fetched_at = self.fetched_at?;
        Some((value, now.saturating_duration_since(fetched_at)))
    }

    pub(crate) fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    pub(crate) fn state(&self, now: Instant, ttl: Duration, max_age: Option<Duration>) -> CacheState {
        if self.inflight.is_some() {
            return CacheState::Refreshing;
        }
        match self.aged_value(now) {
            None => CacheState::Empty,
            Some((_, age)) if age < ttl => CacheState::Fresh,
            Some((_, age)) if max_age.map_or(false, |max| age >= max) => CacheState::Empty,
            Some(_) => CacheState::Stale,
        }
    }
}

/// Entry storage, shareable between cache wrappers
///
/// Wrappers built over the same store with the same key share one entry
/// and therefore one in-flight fetch. Entries live as long as the store.
#[derive(Clone, Default)]
pub struct CacheStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Entries stay consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a value is cached under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.lock().get(key).map_or(false, |e| e.value.is_some())
    }

    /// Keys with an entry
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drop the cached value and detach any in-flight fetch for `key`
    ///
    /// A detached fetch still completes for its callers but its result is
    /// not stored.
    pub fn invalidate(&self, key: &str) {
        if let Some(entry) = self.lock().get_mut(key) {
            entry.value = None;
            entry.fetched_at = None;
            entry.inflight = None;
        }
    }

    /// Invalidate every entry
    pub fn clear(&self) {
        for entry in self.lock().values_mut() {
            entry.value = None;
            entry.fetched_at = None;
            entry.inflight = None;
        }
    }
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("keys", &self.keys())
            .finish()
    }
}
