use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::backend::{BackendMode, Persistence};
use crate::models::board::{Board, Stone};
use crate::models::participant::{Identity, Participant};

pub const DEFAULT_TIME_LIMIT_MINUTES: u32 = 30;
pub const MAX_ROOM_NAME_LENGTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
    Abandoned,
}

impl RoomStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RoomStatus::Finished | RoomStatus::Abandoned)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Playing => "playing",
            RoomStatus::Finished => "finished",
            RoomStatus::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOptions {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default, alias = "timeLimit")]
    pub time_limit_minutes: Option<u32>,
}

/// Durable identity and membership of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_code: String,
    pub name: String,
    pub creator: Identity,
    pub creator_name: String,
    pub black_player: Option<Identity>,
    pub white_player: Option<Identity>,
    pub status: RoomStatus,
    pub is_private: bool,
    pub time_limit_minutes: u32,
    pub persistence: Persistence,
    pub state_backend: BackendMode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    /// A fresh room in `waiting` with the creator in the black seat.
    pub fn new(
        room_code: &str,
        creator: &Participant,
        options: &RoomOptions,
        persistence: Persistence,
        state_backend: BackendMode,
    ) -> Self {
        let now = Utc::now();
        let name = options
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| name.chars().take(MAX_ROOM_NAME_LENGTH).collect())
            .unwrap_or_else(|| format!("{}'s Room", creator.display_name));

        Room {
            room_code: room_code.to_string(),
            name,
            creator: creator.identity.clone(),
            creator_name: creator.display_name.clone(),
            black_player: Some(creator.identity.clone()),
            white_player: None,
            status: RoomStatus::Waiting,
            is_private: options.is_private,
            time_limit_minutes: options
                .time_limit_minutes
                .unwrap_or(DEFAULT_TIME_LIMIT_MINUTES),
            persistence,
            state_backend,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn seat(&self, stone: Stone) -> Option<&Identity> {
        match stone {
            Stone::Black => self.black_player.as_ref(),
            Stone::White => self.white_player.as_ref(),
        }
    }

    pub fn set_seat(&mut self, stone: Stone, occupant: Option<Identity>) {
        match stone {
            Stone::Black => self.black_player = occupant,
            Stone::White => self.white_player = occupant,
        }
        self.touch();
    }

    pub fn seat_of(&self, identity: &Identity) -> Option<Stone> {
        [Stone::Black, Stone::White]
            .into_iter()
            .find(|stone| self.seat(*stone) == Some(identity))
    }

    pub fn player_count(&self) -> usize {
        self.black_player.iter().count() + self.white_player.iter().count()
    }

    pub fn is_unseated(&self) -> bool {
        self.player_count() == 0
    }

    /// True when the participant created or occupies a seat in this room.
    pub fn involves(&self, identity: &Identity) -> bool {
        &self.creator == identity || self.seat_of(identity).is_some()
    }

    pub fn has_guest(&self) -> bool {
        self.creator.is_guest()
            || self.black_player.as_ref().is_some_and(Identity::is_guest)
            || self.white_player.as_ref().is_some_and(Identity::is_guest)
    }

    pub fn set_status(&mut self, status: RoomStatus) {
        self.status = status;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Entry of the public room list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_code: String,
    pub name: String,
    pub status: RoomStatus,
    pub player_count: usize,
    pub creator_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        RoomSummary {
            room_code: room.room_code.clone(),
            name: room.name.clone(),
            status: room.status,
            player_count: room.player_count(),
            creator_name: room.creator_name.clone(),
            created_at: room.created_at,
        }
    }
}

/// Point-in-time view of a room and its board, as shown to joiners and spectators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_code: String,
    pub name: String,
    pub status: RoomStatus,
    pub board: Board,
    pub current_player: Stone,
    pub game_active: bool,
    pub black_player_id: Option<String>,
    pub white_player_id: Option<String>,
    pub spectator_count: usize,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creator() -> Participant {
        Participant::registered("player-1", "Alice")
    }

    #[test]
    fn test_new_room_seats_creator_black() {
        let room = Room::new(
            "ABCD1234",
            &creator(),
            &RoomOptions::default(),
            Persistence::Durable,
            BackendMode::InProcess,
        );

        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.seat_of(&creator().identity), Some(Stone::Black));
        assert_eq!(room.seat_of(&Identity::Guest("player-1".to_string())), None);
        assert!(room.white_player.is_none());
        assert_eq!(room.name, "Alice's Room");
        assert_eq!(room.time_limit_minutes, DEFAULT_TIME_LIMIT_MINUTES);
        assert_eq!(room.player_count(), 1);
    }

    #[test]
    fn test_blank_room_name_falls_back_to_creator() {
        let options = RoomOptions {
            name: Some("   ".to_string()),
            ..RoomOptions::default()
        };
        let room = Room::new(
            "ABCD1234",
            &creator(),
            &options,
            Persistence::MemoryOnly,
            BackendMode::InProcess,
        );

        assert_eq!(room.name, "Alice's Room");
    }

    #[test]
    fn test_has_guest() {
        let mut room = Room::new(
            "ABCD1234",
            &creator(),
            &RoomOptions::default(),
            Persistence::Durable,
            BackendMode::External,
        );
        assert!(!room.has_guest());

        room.set_seat(Stone::White, Some(Identity::Guest("g-9".to_string())));
        assert!(room.has_guest());
        assert!(room.involves(&Identity::Guest("g-9".to_string())));
        assert!(!room.involves(&Identity::Registered("g-9".to_string())));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(RoomStatus::Finished.is_terminal());
        assert!(RoomStatus::Abandoned.is_terminal());
        assert!(!RoomStatus::Waiting.is_terminal());
        assert!(!RoomStatus::Playing.is_terminal());
    }

    #[test]
    fn test_room_options_accept_time_limit_alias() {
        let options: RoomOptions =
            serde_json::from_str(r#"{"name":"Lobby","isPrivate":true,"timeLimit":10}"#).unwrap();

        assert_eq!(options.name.as_deref(), Some("Lobby"));
        assert!(options.is_private);
        assert_eq!(options.time_limit_minutes, Some(10));
    }
}
