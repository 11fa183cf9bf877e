use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::board::{Board, Position, Stone};
use crate::models::participant::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    FiveInRow,
    BoardFull,
    Surrender,
}

/// Terminal result of one game. `winner == None` is a draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub winner: Option<Stone>,
    pub winning_line: Option<Vec<Position>>,
    pub reason: EndReason,
}

impl MatchOutcome {
    pub fn five_in_row(winner: Stone, line: Vec<Position>) -> Self {
        MatchOutcome {
            winner: Some(winner),
            winning_line: Some(line),
            reason: EndReason::FiveInRow,
        }
    }

    pub fn draw() -> Self {
        MatchOutcome {
            winner: None,
            winning_line: None,
            reason: EndReason::BoardFull,
        }
    }

    pub fn surrender(winner: Stone) -> Self {
        MatchOutcome {
            winner: Some(winner),
            winning_line: None,
            reason: EndReason::Surrender,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seats {
    pub black: Option<Identity>,
    pub white: Option<Identity>,
}

impl Seats {
    pub fn get(&self, stone: Stone) -> Option<&Identity> {
        match stone {
            Stone::Black => self.black.as_ref(),
            Stone::White => self.white.as_ref(),
        }
    }

    pub fn set(&mut self, stone: Stone, occupant: Option<Identity>) {
        match stone {
            Stone::Black => self.black = occupant,
            Stone::White => self.white = occupant,
        }
    }

    pub fn seat_of(&self, identity: &Identity) -> Option<Stone> {
        [Stone::Black, Stone::White]
            .into_iter()
            .find(|stone| self.get(*stone) == Some(identity))
    }

    pub fn both_filled(&self) -> bool {
        self.black.is_some() && self.white.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub row: usize,
    pub col: usize,
    pub player: Stone,
    pub played_at: DateTime<Utc>,
}

/// Volatile play state of one room, addressed by the room code.
///
/// `version` counts committed writes; a write only lands if the stored
/// version is still the one it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub board: Board,
    pub current_player: Stone,
    pub active: bool,
    pub seats: Seats,
    #[serde(default)]
    pub spectators: BTreeSet<Identity>,
    #[serde(default)]
    pub moves: Vec<MoveRecord>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub outcome: Option<MatchOutcome>,
    #[serde(default)]
    pub result_recorded: bool,
    #[serde(default)]
    pub version: u64,
}

impl GameState {
    pub fn new(black: Option<Identity>) -> Self {
        GameState {
            board: Board::new(),
            current_player: Stone::Black,
            active: false,
            seats: Seats { black, white: None },
            spectators: BTreeSet::new(),
            moves: Vec::new(),
            started_at: None,
            outcome: None,
            result_recorded: false,
            version: 0,
        }
    }

    /// Empties the board for a new game, keeping seats and spectators.
    pub fn reset(&mut self) {
        self.board = Board::new();
        self.current_player = Stone::Black;
        self.active = self.seats.both_filled();
        self.moves.clear();
        self.started_at = self.active.then(Utc::now);
        self.outcome = None;
        self.result_recorded = false;
    }

    pub fn start(&mut self) {
        self.active = true;
        self.started_at = Some(Utc::now());
    }

    pub fn finish(&mut self, outcome: MatchOutcome) {
        self.active = false;
        self.outcome = Some(outcome);
    }
}
