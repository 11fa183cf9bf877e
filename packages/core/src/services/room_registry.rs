use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::backend::Persistence;
use crate::models::participant::{Identity, Participant};
use crate::models::room::Room;
use crate::repositories::errors::room_repository_errors::RoomRepositoryError;
use crate::repositories::room_repository::RoomRepository;
use crate::repositories::state_store::{active_room_key, room_code_key, room_key, StateStore};
use crate::services::errors::coordinator_errors::CoordinatorError;

/// Where rooms live. Durable rooms go to the [`RoomRepository`]; memory-only
/// rooms are kept in the State Store on the backend they are pinned to.
///
/// A room is durable only while the durable store is configured and
/// available and every identity on it is registered. The decision is made on
/// the [`Identity`] tag.
pub struct RoomRegistry {
    durable: Option<Arc<dyn RoomRepository + Send + Sync>>,
    store: Arc<StateStore>,
    memory_rooms: DashMap<String, CachedRoom>,
    room_ttl: Duration,
}

/// Local copy of a memory-only room; it lapses with the stored record.
struct CachedRoom {
    room: Room,
    seen_at: Instant,
}

impl RoomRegistry {
    pub fn new(
        durable: Option<Arc<dyn RoomRepository + Send + Sync>>,
        store: Arc<StateStore>,
        room_ttl: Duration,
    ) -> Self {
        RoomRegistry {
            durable,
            store,
            memory_rooms: DashMap::new(),
            room_ttl,
        }
    }

    async fn durable_if_available(&self) -> Option<&Arc<dyn RoomRepository + Send + Sync>> {
        match &self.durable {
            Some(durable) if durable.is_available().await => Some(durable),
            _ => None,
        }
    }

    /// Registers a new room under a code nobody holds. Returns `false` on a
    /// code collision so the caller can draw another code.
    pub async fn insert_new(&self, room: &mut Room) -> Result<bool, CoordinatorError> {
        self.sweep_cache();
        let code = room.room_code.clone();
        let mode = room.state_backend;
        let reserved = self
            .store
            .set_if_absent(mode, &room_code_key(&code), &code, self.room_ttl)
            .await?;
        if !reserved {
            debug!("Room code {} already reserved", code);
            return Ok(false);
        }

        let durable = if room.has_guest() {
            None
        } else {
            self.durable_if_available().await
        };

        match durable {
            Some(durable) => {
                room.persistence = Persistence::Durable;
                match durable.create_room(room).await {
                    Ok(()) => Ok(true),
                    Err(RoomRepositoryError::AlreadyExists) => Ok(false),
                    Err(e) => {
                        warn!("Durable create of room {} failed: {}", code, e);
                        self.release_code(room).await;
                        Err(e.into())
                    }
                }
            }
            None => {
                room.persistence = Persistence::MemoryOnly;
                if let Err(e) = self.write_memory_room(room).await {
                    self.release_code(room).await;
                    return Err(e);
                }
                Ok(true)
            }
        }
    }

    pub async fn get(&self, room_code: &str) -> Result<Room, CoordinatorError> {
        let cached_mode = self
            .memory_rooms
            .get(room_code)
            .map(|cached| cached.room.state_backend);
        if let Some(mode) = cached_mode {
            return match self.store.get_json::<Room>(mode, &room_key(room_code)).await? {
                Some(room) => {
                    self.remember(&room);
                    Ok(room)
                }
                None => {
                    self.memory_rooms.remove(room_code);
                    Err(CoordinatorError::RoomNotFound)
                }
            };
        }

        // Memory-only rooms written by other instances sharing the store.
        let mode = self.store.mode();
        let store_error = match self.store.get_json::<Room>(mode, &room_key(room_code)).await {
            Ok(Some(room)) => {
                self.remember(&room);
                return Ok(room);
            }
            Ok(None) => None,
            Err(e) => Some(e),
        };

        if let Some(durable) = &self.durable {
            match durable.get_room(room_code).await {
                Ok(room) => return Ok(room),
                Err(RoomRepositoryError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        match store_error {
            Some(e) => Err(e.into()),
            None => Err(CoordinatorError::RoomNotFound),
        }
    }

    /// Persists `room`, which was read as `previous`.
    ///
    /// A durable room that now holds a guest moves to memory-only. When the
    /// durable write fails nothing changes: `previous` is kept memory-only for
    /// later operations and the error is returned.
    pub async fn save(&self, previous: &Room, room: &mut Room) -> Result<(), CoordinatorError> {
        match room.persistence {
            Persistence::MemoryOnly => self.write_memory_room(room).await,
            Persistence::Durable if room.has_guest() => {
                info!("Room {} has a guest, moving it to memory-only", room.room_code);
                room.persistence = Persistence::MemoryOnly;
                self.write_memory_room(room).await?;
                if let Some(durable) = &self.durable {
                    if let Err(e) = durable.delete_room(&room.room_code).await {
                        warn!("Failed to remove durable record of {}: {}", room.room_code, e);
                    }
                }
                Ok(())
            }
            Persistence::Durable => {
                let Some(durable) = &self.durable else {
                    room.persistence = Persistence::MemoryOnly;
                    return self.write_memory_room(room).await;
                };
                match durable.update_room(room).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        warn!(
                            "Durable update of room {} failed, keeping it memory-only: {}",
                            room.room_code, e
                        );
                        let mut last_known = previous.clone();
                        last_known.persistence = Persistence::MemoryOnly;
                        if let Err(store_error) = self.write_memory_room(&last_known).await {
                            warn!(
                                "Could not keep room {} in the state store: {}",
                                room.room_code, store_error
                            );
                        }
                        Err(CoordinatorError::DurableStoreUnavailable(e.to_string()))
                    }
                }
            }
        }
    }

    /// Removes the room record and its code reservation.
    pub async fn delete(&self, room: &Room) -> Result<(), CoordinatorError> {
        if room.persistence == Persistence::Durable {
            if let Some(durable) = &self.durable {
                durable.delete_room(&room.room_code).await?;
            }
        }
        self.memory_rooms.remove(&room.room_code);
        self.store
            .delete(room.state_backend, &room_key(&room.room_code))
            .await?;
        self.release_code(room).await;
        info!("Deleted room {}", room.room_code);
        Ok(())
    }

    /// The room a participant is already active in, if any.
    ///
    /// Looks at the active-room claim first, then at the durable store for
    /// registered participants.
    pub async fn active_room_for(
        &self,
        participant: &Participant,
    ) -> Result<Option<String>, CoordinatorError> {
        // Claims live on the backend of the claimed room, so both are checked.
        let key = active_room_key(&participant.key());
        for mode in self.store.readable_modes() {
            if let Some(code) = self.store.get(mode, &key).await? {
                if self.is_active_in(&code, &participant.identity).await? {
                    return Ok(Some(code));
                }
            }
        }

        if let Identity::Registered(account_id) = &participant.identity {
            if let Some(durable) = self.durable_if_available().await {
                match durable.find_active_room_for(account_id).await {
                    Ok(room) => return Ok(room.map(|room| room.room_code)),
                    Err(e) => warn!("Active room lookup for {} failed: {}", account_id, e),
                }
            }
        }
        Ok(None)
    }

    /// Records `room_code` as the participant's one active room.
    ///
    /// The claim is created only if absent; an existing claim on a room that
    /// is gone or over is replaced.
    pub async fn claim_active(
        &self,
        identity: &Identity,
        room: &Room,
    ) -> Result<(), CoordinatorError> {
        let key = active_room_key(&identity.key());
        let mode = room.state_backend;
        if self
            .store
            .set_if_absent(mode, &key, &room.room_code, self.room_ttl)
            .await?
        {
            return Ok(());
        }

        if let Some(code) = self.store.get(mode, &key).await? {
            if code == room.room_code {
                return Ok(());
            }
            if self.is_active_in(&code, identity).await? {
                return Err(CoordinatorError::AlreadyInActiveRoom(code));
            }
        }

        debug!("Replacing stale active-room claim of {}", key);
        self.store
            .set(mode, &key, &room.room_code, self.room_ttl)
            .await?;
        Ok(())
    }

    /// Drops the participant's claim if it points at this room.
    pub async fn release_active(&self, identity: &Identity, room: &Room) {
        let key = active_room_key(&identity.key());
        let mode = room.state_backend;
        let result = match self.store.get(mode, &key).await {
            Ok(Some(code)) if code == room.room_code => self.store.delete(mode, &key).await,
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(
                "Failed to release active room claim of {} on {}: {}",
                identity.key(), room.room_code, e
            );
        }
    }

    async fn is_active_in(
        &self,
        room_code: &str,
        identity: &Identity,
    ) -> Result<bool, CoordinatorError> {
        match self.get(room_code).await {
            Ok(room) => Ok(!room.status.is_terminal() && room.involves(identity)),
            Err(CoordinatorError::RoomNotFound) | Err(CoordinatorError::CorruptState(_)) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Public, non-terminal rooms from both paths, newest first.
    pub async fn list_public(&self, limit: usize) -> Vec<Room> {
        self.sweep_cache();
        let mut rooms: Vec<Room> = self
            .memory_rooms
            .iter()
            .filter(|entry| !entry.room.is_private && !entry.room.status.is_terminal())
            .map(|entry| entry.room.clone())
            .collect();

        if let Some(durable) = self.durable_if_available().await {
            match durable.list_public_rooms(limit).await {
                Ok(durable_rooms) => {
                    for room in durable_rooms {
                        if !rooms.iter().any(|known| known.room_code == room.room_code) {
                            rooms.push(room);
                        }
                    }
                }
                Err(e) => warn!("Listing durable rooms failed: {}", e),
            }
        }

        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rooms.truncate(limit);
        rooms
    }

    async fn write_memory_room(&self, room: &Room) -> Result<(), CoordinatorError> {
        self.store
            .set_json(
                room.state_backend,
                &room_key(&room.room_code),
                room,
                self.room_ttl,
            )
            .await?;
        self.cache(room);
        Ok(())
    }

    fn cache(&self, room: &Room) {
        self.memory_rooms.insert(
            room.room_code.clone(),
            CachedRoom {
                room: room.clone(),
                seen_at: Instant::now(),
            },
        );
    }

    /// Caches a room that was read; reads do not extend its stored TTL.
    fn remember(&self, room: &Room) {
        self.memory_rooms
            .entry(room.room_code.clone())
            .and_modify(|cached| cached.room = room.clone())
            .or_insert_with(|| CachedRoom {
                room: room.clone(),
                seen_at: Instant::now(),
            });
    }

    /// Forgets cached rooms whose stored record has outlived its TTL.
    fn sweep_cache(&self) {
        let before = self.memory_rooms.len();
        self.memory_rooms
            .retain(|_, cached| cached.seen_at.elapsed() < self.room_ttl);
        let dropped = before - self.memory_rooms.len();
        if dropped > 0 {
            debug!("Forgot {} lapsed memory-only rooms", dropped);
        }
    }

    /// Memory-only rooms held locally.
    pub fn cached_rooms(&self) -> usize {
        self.memory_rooms.len()
    }

    async fn release_code(&self, room: &Room) {
        if let Err(e) = self
            .store
            .delete(room.state_backend, &room_code_key(&room.room_code))
            .await
        {
            warn!("Failed to release room code {}: {}", room.room_code, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::backend::BackendMode;
    use crate::models::board::Stone;
    use crate::models::room::{RoomOptions, RoomStatus};
    use crate::repositories::in_memory_state_backend::InMemoryStateBackend;
    use crate::repositories::room_repository::MockRoomRepository;
    use crate::repositories::state_store::StateStoreSettings;

    fn store() -> Arc<StateStore> {
        Arc::new(StateStore::in_process(
            Arc::new(InMemoryStateBackend::new()),
            StateStoreSettings::default(),
        ))
    }

    fn registry(durable: Option<MockRoomRepository>) -> RoomRegistry {
        RoomRegistry::new(
            durable.map(|repo| Arc::new(repo) as Arc<dyn RoomRepository + Send + Sync>),
            store(),
            Duration::from_secs(3600),
        )
    }

    fn new_room(code: &str, creator: &Participant) -> Room {
        Room::new(
            code,
            creator,
            &RoomOptions::default(),
            Persistence::MemoryOnly,
            BackendMode::InProcess,
        )
    }

    #[tokio::test]
    async fn test_registered_room_goes_durable() {
        let mut durable = MockRoomRepository::new();
        durable.expect_is_available().returning(|| true);
        durable.expect_create_room().times(1).returning(|_| Ok(()));
        let registry = registry(Some(durable));
        let mut room = new_room("ROOM0001", &Participant::registered("p1", "Alice"));

        assert!(registry.insert_new(&mut room).await.unwrap());
        assert_eq!(room.persistence, Persistence::Durable);
    }

    #[tokio::test]
    async fn test_guest_room_never_touches_durable_store() {
        let mut durable = MockRoomRepository::new();
        durable.expect_is_available().returning(|| true);
        durable.expect_create_room().never();
        let registry = registry(Some(durable));
        let mut room = new_room("ROOM0002", &Participant::guest("g-1", "Anon"));

        assert!(registry.insert_new(&mut room).await.unwrap());
        assert_eq!(room.persistence, Persistence::MemoryOnly);
        assert_eq!(registry.get("ROOM0002").await.unwrap(), room);
    }

    #[tokio::test]
    async fn test_unavailable_durable_store_routes_memory_only() {
        let mut durable = MockRoomRepository::new();
        durable.expect_is_available().returning(|| false);
        durable.expect_create_room().never();
        let registry = registry(Some(durable));
        let mut room = new_room("ROOM0003", &Participant::registered("p1", "Alice"));

        assert!(registry.insert_new(&mut room).await.unwrap());
        assert_eq!(room.persistence, Persistence::MemoryOnly);
    }

    #[tokio::test]
    async fn test_code_collision_returns_false() {
        let registry = registry(None);
        let mut first = new_room("SAMECODE", &Participant::guest("g-1", "A"));
        let mut second = new_room("SAMECODE", &Participant::guest("g-2", "B"));

        assert!(registry.insert_new(&mut first).await.unwrap());
        assert!(!registry.insert_new(&mut second).await.unwrap());
    }

    #[tokio::test]
    async fn test_guest_join_migrates_durable_room() {
        let mut durable = MockRoomRepository::new();
        durable.expect_is_available().returning(|| true);
        durable.expect_create_room().returning(|_| Ok(()));
        durable.expect_update_room().never();
        durable
            .expect_delete_room()
            .withf(|code| code == "ROOM0004")
            .times(1)
            .returning(|_| Ok(()));
        let registry = registry(Some(durable));
        let mut room = new_room("ROOM0004", &Participant::registered("p1", "Alice"));
        registry.insert_new(&mut room).await.unwrap();

        let previous = room.clone();
        room.set_seat(Stone::White, Some(Identity::Guest("g-9".to_string())));
        registry.save(&previous, &mut room).await.unwrap();

        assert_eq!(room.persistence, Persistence::MemoryOnly);
        let stored = registry.get("ROOM0004").await.unwrap();
        assert_eq!(stored.persistence, Persistence::MemoryOnly);
        assert!(stored.has_guest());
    }

    #[tokio::test]
    async fn test_durable_failure_keeps_last_known_room() {
        let mut durable = MockRoomRepository::new();
        durable.expect_is_available().returning(|| true);
        durable.expect_create_room().returning(|_| Ok(()));
        durable
            .expect_update_room()
            .returning(|_| Err(RoomRepositoryError::DynamoDb("timeout".to_string())));
        let registry = registry(Some(durable));
        let mut room = new_room("ROOM0005", &Participant::registered("p1", "Alice"));
        registry.insert_new(&mut room).await.unwrap();

        let previous = room.clone();
        room.set_seat(Stone::White, Some(Identity::Registered("p2".to_string())));
        let result = registry.save(&previous, &mut room).await;

        assert!(matches!(result, Err(CoordinatorError::DurableStoreUnavailable(_))));
        let stored = registry.get("ROOM0005").await.unwrap();
        assert_eq!(stored.persistence, Persistence::MemoryOnly);
        assert!(stored.white_player.is_none());
    }

    #[tokio::test]
    async fn test_claims_enforce_one_active_room() {
        let registry = registry(None);
        let alice = Participant::guest("g-1", "Alice");
        let mut first = new_room("ROOMAAAA", &alice);
        registry.insert_new(&mut first).await.unwrap();
        registry.claim_active(&alice.identity, &first).await.unwrap();

        let mut second = new_room("ROOMBBBB", &alice);
        registry.insert_new(&mut second).await.unwrap();

        assert_eq!(
            registry.claim_active(&alice.identity, &second).await,
            Err(CoordinatorError::AlreadyInActiveRoom("ROOMAAAA".to_string()))
        );
        assert_eq!(
            registry.active_room_for(&alice).await.unwrap(),
            Some("ROOMAAAA".to_string())
        );
    }

    #[tokio::test]
    async fn test_guest_with_account_id_does_not_see_account_claim() {
        let registry = registry(None);
        let ann = Participant::registered("acc-ann", "Ann");
        let lookalike = Participant::guest("acc-ann", "Ann");
        let mut room = new_room("ROOMAAAA", &ann);
        registry.insert_new(&mut room).await.unwrap();
        registry.claim_active(&ann.identity, &room).await.unwrap();

        assert_eq!(registry.active_room_for(&lookalike).await.unwrap(), None);
        assert_eq!(
            registry.active_room_for(&ann).await.unwrap(),
            Some("ROOMAAAA".to_string())
        );
    }

    #[tokio::test]
    async fn test_stale_claim_is_replaced() {
        let registry = registry(None);
        let alice = Participant::guest("g-1", "Alice");
        let mut first = new_room("ROOMAAAA", &alice);
        registry.insert_new(&mut first).await.unwrap();
        registry.claim_active(&alice.identity, &first).await.unwrap();

        let previous = first.clone();
        first.set_status(RoomStatus::Finished);
        registry.save(&previous, &mut first).await.unwrap();

        let mut second = new_room("ROOMBBBB", &alice);
        registry.insert_new(&mut second).await.unwrap();

        assert_eq!(registry.active_room_for(&alice).await.unwrap(), None);
        assert_eq!(registry.claim_active(&alice.identity, &second).await, Ok(()));
    }

    #[tokio::test]
    async fn test_listing_merges_and_hides_private_rooms() {
        let mut durable = MockRoomRepository::new();
        durable.expect_is_available().returning(|| true);
        durable.expect_list_public_rooms().returning(|_| {
            Ok(vec![Room::new(
                "DURABLE1",
                &Participant::registered("p9", "Zed"),
                &RoomOptions::default(),
                Persistence::Durable,
                BackendMode::InProcess,
            )])
        });
        let registry = registry(Some(durable));

        let mut public = new_room("PUBLIC01", &Participant::guest("g-1", "A"));
        let mut private = Room::new(
            "PRIVATE1",
            &Participant::guest("g-2", "B"),
            &RoomOptions {
                is_private: true,
                ..RoomOptions::default()
            },
            Persistence::MemoryOnly,
            BackendMode::InProcess,
        );
        registry.insert_new(&mut public).await.unwrap();
        registry.insert_new(&mut private).await.unwrap();

        let codes: Vec<String> = registry
            .list_public(20)
            .await
            .into_iter()
            .map(|room| room.room_code)
            .collect();

        assert!(codes.contains(&"PUBLIC01".to_string()));
        assert!(codes.contains(&"DURABLE1".to_string()));
        assert!(!codes.contains(&"PRIVATE1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lapsed_rooms_leave_the_local_cache() {
        let registry = RoomRegistry::new(None, store(), Duration::from_secs(60));
        for index in 0..5 {
            let mut room = new_room(
                &format!("ROOM000{}", index),
                &Participant::guest(&format!("g-{}", index), "A"),
            );
            registry.insert_new(&mut room).await.unwrap();
        }
        assert_eq!(registry.cached_rooms(), 5);

        tokio::time::advance(Duration::from_secs(61)).await;
        let mut fresh = new_room("ROOMNEW1", &Participant::guest("g-new", "B"));
        registry.insert_new(&mut fresh).await.unwrap();

        assert_eq!(registry.cached_rooms(), 1);
        assert_eq!(registry.get("ROOM0001").await, Err(CoordinatorError::RoomNotFound));
    }

    #[tokio::test]
    async fn test_delete_frees_code() {
        let registry = registry(None);
        let mut room = new_room("ROOMDDDD", &Participant::guest("g-1", "A"));
        registry.insert_new(&mut room).await.unwrap();

        registry.delete(&room).await.unwrap();

        assert_eq!(registry.get("ROOMDDDD").await, Err(CoordinatorError::RoomNotFound));
        let mut again = new_room("ROOMDDDD", &Participant::guest("g-2", "B"));
        assert!(registry.insert_new(&mut again).await.unwrap());
    }
}
