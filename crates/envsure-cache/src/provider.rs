//! Cache wrapper around any provider

use async_trait::async_trait;
use envsure_core::providers::{Provider, ProviderResult, RawEnv, SourceKind};
use futures::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{CacheConfig, CacheError};
use crate::store::{CacheState, CacheStore, Entry, Inflight, SharedFetch};

/// Counter snapshot for one cache wrapper
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Loads answered from a fresh entry
    pub hits: u64,
    /// Loads answered from a stale entry while revalidating
    pub stale_hits: u64,
    /// Inner fetches started
    pub fetches: u64,
    /// Fetches that failed while an older value was cached
    pub refresh_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    fetches: AtomicU64,
    refresh_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// What a load call does after inspecting the entry
enum Plan {
    /// Serve the cached value, starting this background refresh if any
    Serve(Arc<RawEnv>, Option<SharedFetch>),
    /// Wait for a fetch
    Wait(SharedFetch),
}

/// A provider decorated with a TTL cache
///
/// - Fresh entries are served without I/O.
/// - With stale-while-revalidate, stale entries are served immediately and
///   one background refresh is started.
/// - Otherwise, and once an entry is older than `max_age`, callers wait for
///   a fetch. Concurrent callers join the same fetch.
///
/// A failed fetch never replaces a cached value.
#[derive(Debug, Clone)]
pub struct CachedProvider {
    inner: Arc<dyn Provider>,
    config: CacheConfig,
    key: String,
    store: CacheStore,
    counters: Arc<Counters>,
}

/// Wrap `inner` in a cache with a private store
pub fn cached(
    inner: impl Provider + 'static,
    config: CacheConfig,
) -> Result<CachedProvider, CacheError> {
    CachedProvider::new(Arc::new(inner), config)
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn Provider>, config: CacheConfig) -> Result<Self, CacheError> {
        config.validate()?;
        let key = config.key.clone().unwrap_or_else(|| inner.name().to_string());
        Ok(Self {
            inner,
            config,
            key,
            store: CacheStore::new(),
            counters: Arc::new(Counters::default()),
        })
    }

    /// Keep entries in a shared store
    pub fn with_store(mut self, store: CacheStore) -> Self {
        self.store = store;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn state(&self) -> CacheState {
        let entries = self.store.lock();
        match entries.get(&self.key) {
            Some(entry) => entry.state(Instant::now(), self.config.ttl, self.config.max_age),
            None => CacheState::Empty,
        }
    }

    /// Forget the cached value; the next load fetches
    pub fn invalidate(&self) {
        self.store.invalidate(&self.key);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            stale_hits: self.counters.stale_hits.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            refresh_failures: self.counters.refresh_failures.load(Ordering::Relaxed),
        }
    }

    /// Decide how to answer a load, starting a fetch when one is needed
    ///
    /// `can_spawn` is false outside a tokio runtime; stale entries then
    /// block on the refresh instead of serving.
    fn plan(&self, can_spawn: bool) -> Plan {
        let now = Instant::now();
        let mut entries = self.store.lock();
        let entry = entries.entry(self.key.clone()).or_default();

        if let Some((value, age)) = entry.aged_value(now) {
            if age < self.config.ttl {
                Counters::bump(&self.counters.hits);
                return Plan::Serve(value, None);
            }

            let within_max_age = self.config.max_age.map_or(true, |max| age < max);
            if self.config.stale_while_revalidate && within_max_age {
                if entry.inflight.is_some() {
                    Counters::bump(&self.counters.stale_hits);
                    return Plan::Serve(value, None);
                }
                if can_spawn {
                    Counters::bump(&self.counters.stale_hits);
                    debug!(key = %self.key, age_ms = age.as_millis() as u64, "serving stale value, refreshing");
                    return Plan::Serve(value, Some(self.start_fetch(entry)));
                }
            }
        }

        if let Some(ref inflight) = entry.inflight {
            return Plan::Wait(inflight.fetch.clone());
        }
        Plan::Wait(self.start_fetch(entry))
    }

    /// Register a new in-flight fetch on `entry`
    fn start_fetch(&self, entry: &mut Entry) -> SharedFetch {
        let id = entry.next_id();
        let inner = self.inner.clone();
        let store = self.store.clone();
        let key = self.key.clone();
        let counters = self.counters.clone();

        Counters::bump(&self.counters.fetches);
        debug!(key = %self.key, provider = inner.name(), "starting inner fetch");

        let fetch = async move {
            let result = inner.load().await.map(Arc::new);

            let mut entries = store.lock();
            let entry = entries.entry(key.clone()).or_default();
            if entry.inflight.as_ref().map(|f| f.id) == Some(id) {
                entry.inflight = None;
                match result {
                    Ok(ref value) => {
                        entry.value = Some(value.clone());
                        entry.fetched_at = Some(Instant::now());
                    }
                    Err(ref error) if entry.value.is_some() => {
                        Counters::bump(&counters.refresh_failures);
                        warn!(key = %key, error = %error, "refresh failed, keeping cached value");
                    }
                    Err(ref error) => {
                        debug!(key = %key, error = %error, "fetch failed with nothing cached");
                    }
                }
            }
            drop(entries);
            result
        }
        .boxed()
        .shared();

        entry.inflight = Some(Inflight {
            id,
            fetch: fetch.clone(),
        });
        fetch
    }
}

#[async_trait]
impl Provider for CachedProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> SourceKind {
        self.inner.kind()
    }

    async fn load(&self) -> ProviderResult<RawEnv> {
        let can_spawn = Handle::try_current().is_ok();
        match self.plan(can_spawn) {
            Plan::Serve(value, refresh) => {
                if let Some(refresh) = refresh {
                    tokio::spawn(refresh);
                }
                Ok((*value).clone())
            }
            Plan::Wait(fetch) => fetch.await.map(|value| (*value).clone()),
        }
    }

    /// Answers from a fresh entry, or from a stale one when revalidating
    fn try_load_sync(&self) -> Option<ProviderResult<RawEnv>> {
        let handle = Handle::try_current().ok();
        let now = Instant::now();
        let mut entries = self.store.lock();
        let entry = entries.get_mut(&self.key)?;
        let (value, age) = entry.aged_value(now)?;

        if age < self.config.ttl {
            Counters::bump(&self.counters.hits);
            return Some(Ok((*value).clone()));
        }

        let within_max_age = self.config.max_age.map_or(true, |max| age < max);
        if !self.config.stale_while_revalidate || !within_max_age {
            return None;
        }

        Counters::bump(&self.counters.stale_hits);
        if entry.inflight.is_none() {
            if let Some(handle) = handle {
                let refresh = self.start_fetch(entry);
                drop(entries);
                handle.spawn(refresh);
            }
        }
        Some(Ok((*value).clone()))
    }
}
