#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use gomoku_core::config::CoordinatorConfig;
use gomoku_core::engine::Engine;
use gomoku_core::models::backend::BackendMode;
use gomoku_core::models::game_record::GameRecord;
use gomoku_core::models::participant::Identity;
use gomoku_core::models::player::PlayerStats;
use gomoku_core::models::room::{Room, RoomStatus};
use gomoku_core::repositories::errors::game_record_repository_errors::GameRecordRepositoryError;
use gomoku_core::repositories::errors::player_repository_errors::PlayerRepositoryError;
use gomoku_core::repositories::errors::room_repository_errors::RoomRepositoryError;
use gomoku_core::repositories::errors::state_store_errors::StateStoreError;
use gomoku_core::repositories::game_record_repository::GameRecordRepository;
use gomoku_core::repositories::in_memory_state_backend::InMemoryStateBackend;
use gomoku_core::repositories::player_repository::PlayerRepository;
use gomoku_core::repositories::room_repository::{reject_guests, RoomRepository};
use gomoku_core::repositories::state_store::{StateBackend, StateStore, StateStoreSettings};

/// Durable room store kept in a map. Can be switched off to simulate an outage.
#[derive(Clone, Default)]
pub struct MockRoomRepository {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
    down: Arc<AtomicBool>,
}

impl MockRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub async fn stored(&self, room_code: &str) -> Option<Room> {
        self.rooms.read().await.get(room_code).cloned()
    }

    fn check(&self) -> Result<(), RoomRepositoryError> {
        if self.down.load(Ordering::SeqCst) {
            Err(RoomRepositoryError::DynamoDb("service unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RoomRepository for MockRoomRepository {
    async fn create_room(&self, room: &Room) -> Result<(), RoomRepositoryError> {
        self.check()?;
        reject_guests(room)?;
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.room_code) {
            return Err(RoomRepositoryError::AlreadyExists);
        }
        rooms.insert(room.room_code.clone(), room.clone());
        Ok(())
    }

    async fn get_room(&self, room_code: &str) -> Result<Room, RoomRepositoryError> {
        self.check()?;
        self.rooms
            .read()
            .await
            .get(room_code)
            .cloned()
            .ok_or(RoomRepositoryError::NotFound)
    }

    async fn update_room(&self, room: &Room) -> Result<(), RoomRepositoryError> {
        self.check()?;
        reject_guests(room)?;
        self.rooms
            .write()
            .await
            .insert(room.room_code.clone(), room.clone());
        Ok(())
    }

    async fn delete_room(&self, room_code: &str) -> Result<(), RoomRepositoryError> {
        self.check()?;
        self.rooms.write().await.remove(room_code);
        Ok(())
    }

    async fn find_active_room_for(
        &self,
        participant_id: &str,
    ) -> Result<Option<Room>, RoomRepositoryError> {
        self.check()?;
        let identity = Identity::Registered(participant_id.to_string());
        Ok(self
            .rooms
            .read()
            .await
            .values()
            .find(|room| !room.status.is_terminal() && room.involves(&identity))
            .cloned())
    }

    async fn list_public_rooms(&self, limit: usize) -> Result<Vec<Room>, RoomRepositoryError> {
        self.check()?;
        let mut rooms: Vec<Room> = self
            .rooms
            .read()
            .await
            .values()
            .filter(|room| {
                !room.is_private && matches!(room.status, RoomStatus::Waiting | RoomStatus::Playing)
            })
            .cloned()
            .collect();
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rooms.truncate(limit);
        Ok(rooms)
    }

    async fn is_available(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct SaveFailures {
    succeed_first: usize,
    fail: usize,
}

#[derive(Clone, Default)]
pub struct MockPlayerRepository {
    players: Arc<RwLock<HashMap<String, PlayerStats>>>,
    failures: Arc<std::sync::Mutex<SaveFailures>>,
}

impl MockPlayerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `succeed_first` saves through, then fails the next `fail` saves.
    pub fn fail_saves(&self, succeed_first: usize, fail: usize) {
        *self.failures.lock().unwrap() = SaveFailures {
            succeed_first,
            fail,
        };
    }

    fn next_save_fails(&self) -> bool {
        let mut plan = self.failures.lock().unwrap();
        if plan.fail == 0 {
            return false;
        }
        if plan.succeed_first > 0 {
            plan.succeed_first -= 1;
            return false;
        }
        plan.fail -= 1;
        true
    }

    pub async fn insert(&self, player: PlayerStats) {
        self.players.write().await.insert(player.id.clone(), player);
    }

    pub async fn stored(&self, player_id: &str) -> Option<PlayerStats> {
        self.players.read().await.get(player_id).cloned()
    }
}

#[async_trait]
impl PlayerRepository for MockPlayerRepository {
    async fn get_player(&self, player_id: &str) -> Result<PlayerStats, PlayerRepositoryError> {
        self.players
            .read()
            .await
            .get(player_id)
            .cloned()
            .ok_or(PlayerRepositoryError::NotFound)
    }

    async fn save_player(&self, player: &PlayerStats) -> Result<(), PlayerRepositoryError> {
        if self.next_save_fails() {
            return Err(PlayerRepositoryError::DynamoDb("throttled".to_string()));
        }
        self.insert(player.clone()).await;
        Ok(())
    }

    async fn top_players(&self, limit: usize) -> Result<Vec<PlayerStats>, PlayerRepositoryError> {
        let mut players: Vec<PlayerStats> = self
            .players
            .read()
            .await
            .values()
            .filter(|player| player.is_active)
            .cloned()
            .collect();
        players.sort_by(|a, b| b.rating.cmp(&a.rating));
        players.truncate(limit);
        Ok(players)
    }
}

#[derive(Clone, Default)]
pub struct MockGameRecordRepository {
    records: Arc<RwLock<Vec<GameRecord>>>,
}

impl MockGameRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<GameRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl GameRecordRepository for MockGameRecordRepository {
    async fn save_record(&self, record: &GameRecord) -> Result<(), GameRecordRepositoryError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }
}

/// External State Store backend that can be switched off.
#[derive(Clone, Default)]
pub struct SwitchableBackend {
    inner: Arc<InMemoryStateBackend>,
    down: Arc<AtomicBool>,
}

impl SwitchableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StateStoreError> {
        if self.down.load(Ordering::SeqCst) {
            Err(StateStoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StateBackend for SwitchableBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::External
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StateStoreError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StateStoreError> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        self.check()?;
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn set_if_version(
        &self,
        key: &str,
        value: &str,
        expected: u64,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        self.check()?;
        self.inner.set_if_version(key, value, expected, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StateStoreError> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StateStoreError> {
        self.check()?;
        self.inner.exists(key).await
    }

    async fn probe(&self) -> Result<(), StateStoreError> {
        self.check()
    }
}

pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig::from_lookup(|name| match name {
        "JWT_SECRET" => Some("integration-secret".to_string()),
        _ => None,
    })
    .expect("test configuration is valid")
}

pub fn fast_store_settings() -> StateStoreSettings {
    StateStoreSettings {
        timeout: Duration::from_millis(200),
        retry_attempts: 2,
        retry_backoff: Duration::from_millis(1),
        probe_interval: Duration::ZERO,
    }
}

pub fn memory_store() -> Arc<StateStore> {
    Arc::new(StateStore::in_process(
        Arc::new(InMemoryStateBackend::new()),
        fast_store_settings(),
    ))
}

/// Engine on the in-process store with no durable collaborators.
pub fn guest_engine() -> Engine {
    Engine::assemble(&test_config(), memory_store(), None, None, None, None)
}

pub struct DurableFixture {
    pub engine: Engine,
    pub rooms: MockRoomRepository,
    pub players: MockPlayerRepository,
    pub records: MockGameRecordRepository,
}

/// Engine with map-backed durable room, player and game-record stores.
pub fn durable_engine() -> DurableFixture {
    let rooms = MockRoomRepository::new();
    let players = MockPlayerRepository::new();
    let records = MockGameRecordRepository::new();
    let engine = Engine::assemble(
        &test_config(),
        memory_store(),
        Some(Arc::new(rooms.clone())),
        Some(Arc::new(players.clone())),
        Some(Arc::new(records.clone())),
        None,
    );
    DurableFixture {
        engine,
        rooms,
        players,
        records,
    }
}
