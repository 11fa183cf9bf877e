use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::models::backend::BackendMode;
use crate::repositories::errors::state_store_errors::StateStoreError;
use crate::repositories::state_store::StateBackend;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    value: String,
    version: u64,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

struct Entries {
    map: HashMap<String, Entry>,
    last_sweep: Instant,
}

impl Entries {
    /// Drops expired entries once per sweep interval, so keys nobody reads
    /// again do not pile up.
    fn sweep_if_due(&mut self, now: Instant, interval: Duration) {
        if now.duration_since(self.last_sweep) < interval {
            return;
        }
        self.last_sweep = now;
        let before = self.map.len();
        self.map.retain(|_, entry| entry.is_live(now));
        let removed = before - self.map.len();
        if removed > 0 {
            debug!("Swept {} expired in-process entries", removed);
        }
    }

    fn write(&mut self, key: &str, value: &str, version: u64, expires_at: Instant) {
        self.map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                version,
                expires_at,
            },
        );
    }
}

/// Process-local backend with manual expiry. Expired entries are dropped
/// when next touched, and swept on writes once per sweep interval.
pub struct InMemoryStateBackend {
    entries: Mutex<Entries>,
    sweep_interval: Duration,
}

impl Default for InMemoryStateBackend {
    fn default() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }
}

impl InMemoryStateBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        InMemoryStateBackend {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            sweep_interval,
        }
    }

    /// Drops every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.map.len();
        entries.map.retain(|_, entry| entry.is_live(now));
        entries.last_sweep = now;
        before - entries.map.len()
    }

    /// Entries held, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl StateBackend for InMemoryStateBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::InProcess
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StateStoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.map.get(key) {
            if entry.is_live(now) {
                return Ok(Some(entry.value.clone()));
            }
            entries.map.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StateStoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.sweep_if_due(now, self.sweep_interval);
        entries.write(key, value, 0, now + ttl);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.sweep_if_due(now, self.sweep_interval);
        if entries.map.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }
        entries.write(key, value, 0, now + ttl);
        Ok(true)
    }

    async fn set_if_version(
        &self,
        key: &str,
        value: &str,
        expected: u64,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.sweep_if_due(now, self.sweep_interval);
        let stale = entries
            .map
            .get(key)
            .is_some_and(|entry| entry.is_live(now) && entry.version != expected);
        if stale {
            return Ok(false);
        }
        entries.write(key, value, expected + 1, now + ttl);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), StateStoreError> {
        self.entries.lock().await.map.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StateStoreError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn probe(&self) -> Result<(), StateStoreError> {
        Ok(())
    }
}
