use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use gomoku_core::models::events::{Audience, Delivery};
use gomoku_core::repositories::connection_repository::ConnectionRepository;
use gomoku_core::services::errors::coordinator_errors::CoordinatorError;
use gomoku_core::services::room_coordinator::RoomCoordinator;

/// Posts dispatcher deliveries to open WebSocket connections.
///
/// Room audiences are resolved at send time against the room's current
/// seats and spectators, so a participant who just left is not addressed.
pub struct Broadcaster {
    coordinator: Arc<RoomCoordinator>,
    connections: Arc<dyn ConnectionRepository + Send + Sync>,
}

impl Broadcaster {
    pub fn new(
        coordinator: Arc<RoomCoordinator>,
        connections: Arc<dyn ConnectionRepository + Send + Sync>,
    ) -> Self {
        Broadcaster {
            coordinator,
            connections,
        }
    }

    /// Sends every delivery in order and returns how many posts succeeded.
    /// Failed posts are logged and skipped.
    pub async fn deliver(&self, caller_connection: &str, deliveries: &[Delivery]) -> usize {
        let mut sent = 0;
        for delivery in deliveries {
            let payload = match serde_json::to_string(&delivery.event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Could not serialize outbound event: {}", e);
                    continue;
                }
            };

            for connection_id in self.recipients(caller_connection, &delivery.audience).await {
                match self.connections.send_message(&connection_id, &payload).await {
                    Ok(()) => sent += 1,
                    Err(e) => warn!("Failed to post to connection {}: {}", connection_id, e),
                }
            }
        }
        sent
    }

    async fn recipients(&self, caller_connection: &str, audience: &Audience) -> BTreeSet<String> {
        let (room_id, skipped) = match audience {
            Audience::Caller => return BTreeSet::from([caller_connection.to_string()]),
            Audience::Room(room_id) => (room_id, None),
            Audience::RoomExcept {
                room_id,
                participant_id,
            } => (room_id, Some(participant_id.as_str())),
        };

        let members = match self.coordinator.room_members(room_id).await {
            Ok(members) => members,
            Err(CoordinatorError::RoomNotFound) => {
                debug!("Room {} is gone, nothing to broadcast", room_id);
                return BTreeSet::new();
            }
            Err(e) => {
                warn!("Could not resolve members of room {}: {}", room_id, e);
                return BTreeSet::new();
            }
        };

        let mut recipients = BTreeSet::new();
        for member in members.iter().filter(|m| Some(m.as_str()) != skipped) {
            match self.connections.connections_for(member).await {
                Ok(ids) => recipients.extend(ids),
                Err(e) => warn!("Connection lookup for {} failed: {}", member, e),
            }
        }
        recipients
    }
}
