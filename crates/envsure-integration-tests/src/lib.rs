//! Shared fixtures for the envsure end-to-end tests

use async_trait::async_trait;
use envsure_core::providers::{Provider, ProviderError, ProviderResult, RawEnv, SourceKind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Remote-style provider that counts loads and can be made to fail
///
/// Every successful load returns the configured values plus `LOAD_COUNT`.
#[derive(Debug)]
pub struct CountingProvider {
    name: String,
    kind: SourceKind,
    delay: Duration,
    values: Mutex<RawEnv>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl CountingProvider {
    pub fn new<I, K, V>(name: &str, values: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::build(name, values, Duration::from_millis(10), SourceKind::Remote)
    }

    pub fn with_delay<I, K, V>(name: &str, values: I, delay: Duration) -> Arc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::build(name, values, delay, SourceKind::Remote)
    }

    pub fn file<I, K, V>(name: &str, values: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::build(name, values, Duration::from_millis(1), SourceKind::File)
    }

    fn build<I, K, V>(name: &str, values: I, delay: Duration, kind: SourceKind) -> Arc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Arc::new(Self {
            name: name.to_string(),
            kind,
            delay,
            values: Mutex::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Change a value served by later loads
    pub fn set(&self, key: &str, value: &str) {
        self.lock_values().insert(key.to_string(), value.to_string());
    }

    fn lock_values(&self) -> std::sync::MutexGuard<'_, RawEnv> {
        self.values.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Provider for CountingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn load(&self) -> ProviderResult<RawEnv> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::ConnectionError(format!("{} unavailable", self.name)));
        }
        let mut env = self.lock_values().clone();
        env.insert("LOAD_COUNT".to_string(), n.to_string());
        Ok(env)
    }
}
