use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::participant::Identity;

/// Per-key async mutexes. Each room code (and each participant during room
/// creation and joins) gets its own critical section; different keys never
/// contend.
#[derive(Default)]
pub struct RoomLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn room(&self, room_code: &str) -> OwnedMutexGuard<()> {
        self.acquire(format!("room:{}", room_code)).await
    }

    pub async fn participant(&self, identity: &Identity) -> OwnedMutexGuard<()> {
        self.acquire(format!("participant:{}", identity.key())).await
    }

    async fn acquire(&self, key: String) -> OwnedMutexGuard<()> {
        // Clone out of the map before awaiting so no shard lock is held.
        let mutex = self.locks.entry(key).or_default().clone();
        mutex.lock_owned().await
    }

    /// Drops mutexes nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
