use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::board::{Position, Stone};
use crate::models::game_state::EndReason;
use crate::models::player::RatingChange;
use crate::models::room::{RoomSnapshot, RoomStatus, RoomSummary};

/// Inbound command as framed by the transport, discriminated by `action`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(
    tag = "action",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Command {
    CreateRoom {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        is_private: bool,
        #[serde(default, alias = "timeLimit")]
        time_limit_minutes: Option<u32>,
    },
    JoinRoom {
        room_id: String,
        #[serde(default)]
        as_spectator: bool,
    },
    LeaveRoom {
        room_id: String,
    },
    MakeMove {
        room_id: String,
        row: i64,
        col: i64,
        player: Stone,
    },
    RestartGame {
        room_id: String,
    },
    Surrender {
        room_id: String,
    },
    ChatMessage {
        room_id: String,
        message: String,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateRoom { .. } => "createRoom",
            Command::JoinRoom { .. } => "joinRoom",
            Command::LeaveRoom { .. } => "leaveRoom",
            Command::MakeMove { .. } => "makeMove",
            Command::RestartGame { .. } => "restartGame",
            Command::Surrender { .. } => "surrender",
            Command::ChatMessage { .. } => "chatMessage",
        }
    }

    /// Move, restart and surrender failures are reported as `gameError`,
    /// everything else as `roomError`.
    pub fn is_game_command(&self) -> bool {
        matches!(
            self,
            Command::MakeMove { .. } | Command::RestartGame { .. } | Command::Surrender { .. }
        )
    }
}

/// Outbound event, discriminated by `event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Event {
    RoomCreated {
        room_id: String,
        room: RoomSummary,
        color: Stone,
    },
    RoomJoined {
        room_id: String,
        color: Stone,
        snapshot: RoomSnapshot,
    },
    SpectatorJoined {
        room_id: String,
        snapshot: RoomSnapshot,
    },
    SpectatorEntered {
        room_id: String,
        participant_id: String,
        display_name: String,
    },
    PlayerJoined {
        room_id: String,
        participant_id: String,
        display_name: String,
        color: Stone,
    },
    GameStart {
        room_id: String,
        black_player_id: String,
        white_player_id: String,
        current_player: Stone,
    },
    MoveMade {
        room_id: String,
        row: usize,
        col: usize,
        player: Stone,
        next_player: Option<Stone>,
    },
    GameOver {
        room_id: String,
        winner: Option<Stone>,
        winning_line: Option<Vec<Position>>,
        reason: EndReason,
        #[serde(default)]
        rating_changes: Vec<RatingChange>,
    },
    GameRestart {
        room_id: String,
        restarted_by: String,
        current_player: Stone,
    },
    PlayerLeft {
        room_id: String,
        participant_id: String,
        status: RoomStatus,
    },
    RoomLeft {
        room_id: String,
    },
    ChatMessage {
        room_id: String,
        sender_id: String,
        display_name: String,
        message: String,
        sent_at: DateTime<Utc>,
    },
    RoomError {
        command: String,
        kind: String,
        message: String,
    },
    GameError {
        command: String,
        kind: String,
        message: String,
    },
}

/// Who an outbound event is for. Room audiences are resolved by the transport
/// against the current seats and spectators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Caller,
    Room(String),
    RoomExcept { room_id: String, participant_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub audience: Audience,
    pub event: Event,
}

impl Delivery {
    pub fn caller(event: Event) -> Self {
        Delivery {
            audience: Audience::Caller,
            event,
        }
    }

    pub fn room(room_id: &str, event: Event) -> Self {
        Delivery {
            audience: Audience::Room(room_id.to_string()),
            event,
        }
    }

    pub fn room_except(room_id: &str, participant_id: &str, event: Event) -> Self {
        Delivery {
            audience: Audience::RoomExcept {
                room_id: room_id.to_string(),
                participant_id: participant_id.to_string(),
            },
            event,
        }
    }
}
