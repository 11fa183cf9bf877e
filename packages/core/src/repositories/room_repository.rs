use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::{from_item, to_attribute_value, to_item};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::models::participant::Identity;
use crate::models::room::{Room, RoomStatus};
use crate::repositories::errors::room_repository_errors::RoomRepositoryError;

#[cfg(test)]
use mockall::automock;

/// Durable store for room identity and membership.
///
/// Implementations refuse records that carry a guest identity.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Inserts a room whose code is not yet taken.
    async fn create_room(&self, room: &Room) -> Result<(), RoomRepositoryError>;
    async fn get_room(&self, room_code: &str) -> Result<Room, RoomRepositoryError>;
    async fn update_room(&self, room: &Room) -> Result<(), RoomRepositoryError>;
    async fn delete_room(&self, room_code: &str) -> Result<(), RoomRepositoryError>;
    /// A waiting or playing room the participant created or is seated in.
    async fn find_active_room_for(
        &self,
        participant_id: &str,
    ) -> Result<Option<Room>, RoomRepositoryError>;
    /// Public, non-terminal rooms, newest first.
    async fn list_public_rooms(&self, limit: usize) -> Result<Vec<Room>, RoomRepositoryError>;
    /// Availability flag polled before routing a room to this store.
    async fn is_available(&self) -> bool;
}

pub fn reject_guests(room: &Room) -> Result<(), RoomRepositoryError> {
    let identities = [
        Some(&room.creator),
        room.black_player.as_ref(),
        room.white_player.as_ref(),
    ];
    match identities.into_iter().flatten().find(|identity| identity.is_guest()) {
        Some(identity) => Err(RoomRepositoryError::GuestIdentity(identity.id().to_string())),
        None => Ok(()),
    }
}

pub struct DynamoDbRoomRepository {
    pub client: Client,
    pub table_name: String,
    probe_interval: Duration,
    available: AtomicBool,
    last_probe: Mutex<Option<Instant>>,
}

impl DynamoDbRoomRepository {
    pub fn new(client: Client, table_name: &str, probe_interval: Duration) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
            probe_interval,
            available: AtomicBool::new(true),
            last_probe: Mutex::new(None),
        }
    }

    fn dynamo_error<E>(&self, e: E) -> RoomRepositoryError
    where
        E: std::error::Error,
    {
        if self.available.swap(false, Ordering::SeqCst) {
            warn!("Rooms table {} marked unavailable", self.table_name);
        }
        RoomRepositoryError::DynamoDb(DisplayErrorContext(&e).to_string())
    }

    async fn scan_rooms(
        &self,
        filter: &str,
        names: HashMap<String, String>,
        values: HashMap<String, AttributeValue>,
    ) -> Result<Vec<Room>, RoomRepositoryError> {
        let mut rooms = Vec::new();
        let mut start_key = None;
        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression(filter)
                .set_expression_attribute_names(Some(names.clone()))
                .set_expression_attribute_values(Some(values.clone()))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| self.dynamo_error(e))?;

            for item in output.items.unwrap_or_default() {
                let room: Room = from_item(item)
                    .map_err(|e| RoomRepositoryError::Serialization(e.to_string()))?;
                rooms.push(room);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }
        Ok(rooms)
    }

    fn status_values() -> Result<HashMap<String, AttributeValue>, RoomRepositoryError> {
        let mut values = HashMap::new();
        for (name, status) in [(":waiting", RoomStatus::Waiting), (":playing", RoomStatus::Playing)] {
            values.insert(
                name.to_string(),
                to_attribute_value(status)
                    .map_err(|e| RoomRepositoryError::Serialization(e.to_string()))?,
            );
        }
        Ok(values)
    }
}

#[async_trait]
impl RoomRepository for DynamoDbRoomRepository {
    async fn create_room(&self, room: &Room) -> Result<(), RoomRepositoryError> {
        reject_guests(room)?;
        let item = to_item(room).map_err(|e| RoomRepositoryError::Serialization(e.to_string()))?;
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(room_code)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.as_service_error()
                    .is_some_and(|err| err.is_conditional_check_failed_exception())
                {
                    Err(RoomRepositoryError::AlreadyExists)
                } else {
                    Err(self.dynamo_error(e))
                }
            }
        }
    }

    async fn get_room(&self, room_code: &str) -> Result<Room, RoomRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(
                "room_code",
                to_attribute_value(room_code)
                    .map_err(|e| RoomRepositoryError::Serialization(e.to_string()))?,
            )
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| self.dynamo_error(e))?;

        match output.item {
            Some(item) => {
                from_item(item).map_err(|e| RoomRepositoryError::Serialization(e.to_string()))
            }
            None => Err(RoomRepositoryError::NotFound),
        }
    }

    async fn update_room(&self, room: &Room) -> Result<(), RoomRepositoryError> {
        reject_guests(room)?;
        let item = to_item(room).map_err(|e| RoomRepositoryError::Serialization(e.to_string()))?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| self.dynamo_error(e))?;
        Ok(())
    }

    async fn delete_room(&self, room_code: &str) -> Result<(), RoomRepositoryError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(
                "room_code",
                to_attribute_value(room_code)
                    .map_err(|e| RoomRepositoryError::Serialization(e.to_string()))?,
            )
            .send()
            .await
            .map_err(|e| self.dynamo_error(e))?;
        Ok(())
    }

    async fn find_active_room_for(
        &self,
        participant_id: &str,
    ) -> Result<Option<Room>, RoomRepositoryError> {
        let mut values = Self::status_values()?;
        values.insert(
            ":participant".to_string(),
            AttributeValue::S(participant_id.to_string()),
        );
        let rooms = self
            .scan_rooms(
                "(creator.#id = :participant OR black_player.#id = :participant OR white_player.#id = :participant) AND #status IN (:waiting, :playing)",
                HashMap::from([
                    ("#id".to_string(), "id".to_string()),
                    ("#status".to_string(), "status".to_string()),
                ]),
                values,
            )
            .await?;
        let identity = Identity::Registered(participant_id.to_string());
        Ok(rooms.into_iter().find(|room| room.involves(&identity)))
    }

    async fn list_public_rooms(&self, limit: usize) -> Result<Vec<Room>, RoomRepositoryError> {
        let mut values = Self::status_values()?;
        values.insert(":private".to_string(), AttributeValue::Bool(false));
        let mut rooms = self
            .scan_rooms(
                "is_private = :private AND #status IN (:waiting, :playing)",
                HashMap::from([("#status".to_string(), "status".to_string())]),
                values,
            )
            .await?;
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rooms.truncate(limit);
        Ok(rooms)
    }

    async fn is_available(&self) -> bool {
        if self.available.load(Ordering::SeqCst) {
            return true;
        }

        let mut last_probe = self.last_probe.lock().await;
        if last_probe.is_some_and(|at| at.elapsed() < self.probe_interval) {
            return false;
        }
        *last_probe = Some(Instant::now());

        let healthy = self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
            .is_ok();
        if healthy {
            info!("Rooms table {} reachable again", self.table_name);
            self.available.store(true, Ordering::SeqCst);
        }
        healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::backend::{BackendMode, Persistence};
    use crate::models::board::Stone;
    use crate::models::participant::{Identity, Participant};
    use crate::models::room::RoomOptions;

    fn room(creator: &Participant) -> Room {
        Room::new(
            "ROOM1234",
            creator,
            &RoomOptions::default(),
            Persistence::Durable,
            BackendMode::External,
        )
    }

    #[test]
    fn test_reject_guests_allows_registered_rooms() {
        let mut room = room(&Participant::registered("p1", "Alice"));
        room.set_seat(Stone::White, Some(Identity::Registered("p2".to_string())));

        assert_eq!(reject_guests(&room), Ok(()));
    }

    #[test]
    fn test_reject_guests_refuses_guest_seat() {
        let mut room = room(&Participant::registered("p1", "Alice"));
        room.set_seat(Stone::White, Some(Identity::Guest("g-1".to_string())));

        assert_eq!(
            reject_guests(&room),
            Err(RoomRepositoryError::GuestIdentity("g-1".to_string()))
        );
    }

    #[test]
    fn test_room_item_round_trip() {
        let room = room(&Participant::registered("p1", "Alice"));

        let item: HashMap<String, AttributeValue> = to_item(&room).unwrap();
        assert!(item.contains_key("room_code"));
        assert_eq!(item.get("status").and_then(|a| a.as_s().ok()).map(String::as_str), Some("waiting"));

        let restored: Room = from_item(item).unwrap();
        assert_eq!(restored, room);
    }
}
