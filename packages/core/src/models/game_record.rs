use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::board::Stone;
use crate::models::game_state::MoveRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    BlackWin,
    WhiteWin,
    Draw,
}

impl From<Option<Stone>> for GameResult {
    fn from(winner: Option<Stone>) -> Self {
        match winner {
            Some(Stone::Black) => GameResult::BlackWin,
            Some(Stone::White) => GameResult::WhiteWin,
            None => GameResult::Draw,
        }
    }
}

/// Finalised record of a finished game, written once at game end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: String,
    pub room_code: String,
    pub black_player_id: String,
    pub white_player_id: String,
    pub winner_id: Option<String>,
    pub result: GameResult,
    pub moves: Vec<MoveRecord>,
    pub total_moves: usize,
    pub duration_seconds: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl GameRecord {
    pub fn new(
        room_code: &str,
        black_player_id: &str,
        white_player_id: &str,
        winner: Option<Stone>,
        moves: Vec<MoveRecord>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let finished_at = Utc::now();
        let winner_id = winner.map(|stone| match stone {
            Stone::Black => black_player_id.to_string(),
            Stone::White => white_player_id.to_string(),
        });

        GameRecord {
            id: Uuid::new_v4().to_string(),
            room_code: room_code.to_string(),
            black_player_id: black_player_id.to_string(),
            white_player_id: white_player_id.to_string(),
            winner_id,
            result: GameResult::from(winner),
            total_moves: moves.len(),
            moves,
            duration_seconds: (finished_at - started_at).num_seconds().max(0),
            started_at,
            finished_at,
        }
    }
}
