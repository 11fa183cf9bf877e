use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::backend::{BackendMode, BackendSelection};
use crate::repositories::errors::state_store_errors::StateStoreError;

#[cfg(test)]
use mockall::automock;

/// Expiry-aware key-value backend. Values are opaque strings; expired keys
/// read as absent.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateBackend: Send + Sync {
    fn mode(&self) -> BackendMode;
    async fn get(&self, key: &str) -> Result<Option<String>, StateStoreError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StateStoreError>;
    /// Writes only when the key is absent or expired. Returns whether it wrote.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StateStoreError>;
    /// Writes `value` as version `expected + 1` when the key is absent or
    /// expired, or still holds version `expected`. Returns whether it wrote.
    async fn set_if_version(
        &self,
        key: &str,
        value: &str,
        expected: u64,
        ttl: Duration,
    ) -> Result<bool, StateStoreError>;
    async fn delete(&self, key: &str) -> Result<(), StateStoreError>;
    async fn exists(&self, key: &str) -> Result<bool, StateStoreError>;
    async fn probe(&self) -> Result<(), StateStoreError>;
}

#[derive(Debug, Clone)]
pub struct StateStoreSettings {
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    pub probe_interval: Duration,
}

impl Default for StateStoreSettings {
    fn default() -> Self {
        StateStoreSettings {
            timeout: Duration::from_millis(500),
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(50),
            probe_interval: Duration::from_secs(30),
        }
    }
}

pub fn game_key(room_code: &str) -> String {
    format!("game:{}", room_code)
}

pub fn room_key(room_code: &str) -> String {
    format!("room:{}", room_code)
}

pub fn room_code_key(room_code: &str) -> String {
    format!("room-code:{}", room_code)
}

pub fn active_room_key(participant_id: &str) -> String {
    format!("active-room:{}", participant_id)
}

/// Front door of the State Store.
///
/// Every call names the backend mode it expects. New rooms take
/// [`StateStore::mode`] at creation and keep it, so one room's keys never
/// spread over two backends. The in-process backend is always reachable; the
/// external one only while it is the active mode. A call pinned to a
/// fallen-back external backend re-probes it once the probe interval has
/// passed, so such rooms come back without waiting for a new room.
pub struct StateStore {
    selection: BackendSelection,
    external: Option<Arc<dyn StateBackend>>,
    in_process: Arc<dyn StateBackend>,
    external_active: AtomicBool,
    last_probe: Mutex<Option<Instant>>,
    settings: StateStoreSettings,
}

impl StateStore {
    pub fn in_process(in_process: Arc<dyn StateBackend>, settings: StateStoreSettings) -> Self {
        StateStore {
            selection: BackendSelection::Memory,
            external: None,
            in_process,
            external_active: AtomicBool::new(false),
            last_probe: Mutex::new(None),
            settings,
        }
    }

    /// Picks the starting mode. `Auto` probes the external backend once and
    /// starts in-process if the probe fails.
    pub async fn select(
        selection: BackendSelection,
        external: Option<Arc<dyn StateBackend>>,
        in_process: Arc<dyn StateBackend>,
        settings: StateStoreSettings,
    ) -> Self {
        let external = match selection {
            BackendSelection::Memory => None,
            _ => external,
        };
        let store = StateStore {
            selection,
            external_active: AtomicBool::new(false),
            external,
            in_process,
            last_probe: Mutex::new(None),
            settings,
        };

        match (&store.external, selection) {
            (Some(_), BackendSelection::External) => {
                store.external_active.store(true, Ordering::SeqCst);
            }
            (Some(_), BackendSelection::Auto) => {
                store.reevaluate().await;
            }
            _ => {}
        }
        info!("State store started in {} mode", store.mode());
        store
    }

    /// The mode new rooms are pinned to.
    pub fn mode(&self) -> BackendMode {
        if self.external_active.load(Ordering::SeqCst) {
            BackendMode::External
        } else {
            BackendMode::InProcess
        }
    }

    /// Backends that can be read right now, active mode first.
    pub fn readable_modes(&self) -> Vec<BackendMode> {
        match self.mode() {
            BackendMode::External => vec![BackendMode::External, BackendMode::InProcess],
            BackendMode::InProcess => vec![BackendMode::InProcess],
        }
    }

    /// Like [`StateStore::mode`], but first re-probes a fallen-back external
    /// backend once the probe interval has passed.
    pub async fn current_mode(&self) -> BackendMode {
        if self.selection == BackendSelection::Auto
            && self.external.is_some()
            && self.mode() == BackendMode::InProcess
        {
            let due = {
                let last_probe = self.last_probe.lock().await;
                last_probe.map_or(true, |at| at.elapsed() >= self.settings.probe_interval)
            };
            if due {
                self.reevaluate().await;
            }
        }
        self.mode()
    }

    /// Probes the external backend and switches the active mode to match.
    pub async fn reevaluate(&self) {
        let Some(external) = &self.external else {
            return;
        };
        *self.last_probe.lock().await = Some(Instant::now());

        if self.selection == BackendSelection::External {
            return;
        }

        let healthy = matches!(
            tokio::time::timeout(self.settings.timeout, external.probe()).await,
            Ok(Ok(()))
        );
        let was_active = self.external_active.swap(healthy, Ordering::SeqCst);
        match (was_active, healthy) {
            (true, false) => warn!("External state backend unreachable, switching to in_process"),
            (false, true) => info!("External state backend reachable, switching to external"),
            _ => debug!("State store mode unchanged: {}", self.mode()),
        }
    }

    async fn backend(&self, mode: BackendMode) -> Result<Arc<dyn StateBackend>, StateStoreError> {
        if mode == BackendMode::External {
            self.current_mode().await;
        }
        match mode {
            BackendMode::InProcess => Ok(self.in_process.clone()),
            BackendMode::External => match &self.external {
                Some(external) if self.mode() == BackendMode::External => Ok(external.clone()),
                Some(_) => Err(StateStoreError::Unavailable(
                    "external state backend is not active".to_string(),
                )),
                None => Err(StateStoreError::Unavailable(
                    "external state backend is not configured".to_string(),
                )),
            },
        }
    }

    async fn run<T, F, Fut>(
        &self,
        mode: BackendMode,
        operation: &str,
        key: &str,
        call: F,
    ) -> Result<T, StateStoreError>
    where
        F: Fn(Arc<dyn StateBackend>) -> Fut,
        Fut: Future<Output = Result<T, StateStoreError>>,
    {
        let backend = self.backend(mode).await?;
        let attempts = self.settings.retry_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.settings.timeout, call(backend.clone())).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(StateStoreError::Serialization(msg))) => {
                    return Err(StateStoreError::Serialization(msg))
                }
                Ok(Err(e)) => {
                    warn!(
                        "State store {} on {} failed (attempt {}/{}): {}",
                        operation, key, attempt, attempts, e
                    );
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(
                        "State store {} on {} timed out (attempt {}/{})",
                        operation, key, attempt, attempts
                    );
                    last_error = Some(StateStoreError::Timeout(format!(
                        "{} {} exceeded {:?}",
                        operation, key, self.settings.timeout
                    )));
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.retry_backoff * attempt).await;
            }
        }

        if mode == BackendMode::External {
            self.reevaluate().await;
        }
        Err(last_error.unwrap_or_else(|| StateStoreError::Unavailable(key.to_string())))
    }

    pub async fn get(&self, mode: BackendMode, key: &str) -> Result<Option<String>, StateStoreError> {
        self.run(mode, "get", key, |backend| async move { backend.get(key).await })
            .await
    }

    pub async fn set(
        &self,
        mode: BackendMode,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StateStoreError> {
        self.run(mode, "set", key, |backend| async move {
            backend.set(key, value, ttl).await
        })
        .await
    }

    pub async fn set_if_absent(
        &self,
        mode: BackendMode,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        self.run(mode, "set_if_absent", key, |backend| async move {
            backend.set_if_absent(key, value, ttl).await
        })
        .await
    }

    pub async fn set_if_version(
        &self,
        mode: BackendMode,
        key: &str,
        value: &str,
        expected: u64,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        self.run(mode, "set_if_version", key, |backend| async move {
            backend.set_if_version(key, value, expected, ttl).await
        })
        .await
    }

    pub async fn delete(&self, mode: BackendMode, key: &str) -> Result<(), StateStoreError> {
        self.run(mode, "delete", key, |backend| async move {
            backend.delete(key).await
        })
        .await
    }

    pub async fn exists(&self, mode: BackendMode, key: &str) -> Result<bool, StateStoreError> {
        self.run(mode, "exists", key, |backend| async move {
            backend.exists(key).await
        })
        .await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        mode: BackendMode,
        key: &str,
    ) -> Result<Option<T>, StateStoreError> {
        match self.get(mode, key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StateStoreError::Serialization(format!("{}: {}", key, e))),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize + Sync>(
        &self,
        mode: BackendMode,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), StateStoreError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| StateStoreError::Serialization(format!("{}: {}", key, e)))?;
        self.set(mode, key, &raw, ttl).await
    }

    pub async fn set_json_if_absent<T: Serialize + Sync>(
        &self,
        mode: BackendMode,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| StateStoreError::Serialization(format!("{}: {}", key, e)))?;
        self.set_if_absent(mode, key, &raw, ttl).await
    }

    pub async fn set_json_if_version<T: Serialize + Sync>(
        &self,
        mode: BackendMode,
        key: &str,
        value: &T,
        expected: u64,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| StateStoreError::Serialization(format!("{}: {}", key, e)))?;
        self.set_if_version(mode, key, &raw, expected, ttl).await
    }
}
