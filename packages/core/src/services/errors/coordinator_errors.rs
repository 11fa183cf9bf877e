use crate::repositories::errors::game_record_repository_errors::GameRecordRepositoryError;
use crate::repositories::errors::player_repository_errors::PlayerRepositoryError;
use crate::repositories::errors::room_repository_errors::RoomRepositoryError;
use crate::repositories::errors::state_store_errors::StateStoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    Transient,
    Fatal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    RoomNotFound,
    RoomFinished,
    RoomFull,
    AlreadyInRoom,
    AlreadyInActiveRoom(String),
    NotYourSeat,
    NotYourTurn,
    GameInactive,
    OutOfBounds { row: i64, col: i64 },
    CellOccupied { row: usize, col: usize },
    PermissionDenied,
    WaitingForOpponent,
    InvalidPayload(String),
    StoreUnavailable(String),
    DurableStoreUnavailable(String),
    /// The game state was rewritten by someone else after it was read.
    StateConflict,
    RoomCodeSpaceExhausted,
    CorruptState(String),
}

impl CoordinatorError {
    /// Stable error kind reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            CoordinatorError::RoomNotFound => "RoomNotFound",
            CoordinatorError::RoomFinished => "RoomFinished",
            CoordinatorError::RoomFull => "RoomFull",
            CoordinatorError::AlreadyInRoom => "AlreadyInRoom",
            CoordinatorError::AlreadyInActiveRoom(_) => "AlreadyInActiveRoom",
            CoordinatorError::NotYourSeat => "NotYourSeat",
            CoordinatorError::NotYourTurn => "NotYourTurn",
            CoordinatorError::GameInactive => "GameInactive",
            CoordinatorError::OutOfBounds { .. } => "OutOfBounds",
            CoordinatorError::CellOccupied { .. } => "CellOccupied",
            CoordinatorError::PermissionDenied => "PermissionDenied",
            CoordinatorError::WaitingForOpponent => "WaitingForOpponent",
            CoordinatorError::InvalidPayload(_) => "InvalidPayload",
            CoordinatorError::StoreUnavailable(_) => "StoreUnavailable",
            CoordinatorError::DurableStoreUnavailable(_) => "DurableStoreUnavailable",
            CoordinatorError::StateConflict => "StateConflict",
            CoordinatorError::RoomCodeSpaceExhausted => "RoomCodeSpaceExhausted",
            CoordinatorError::CorruptState(_) => "CorruptState",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CoordinatorError::OutOfBounds { .. } | CoordinatorError::InvalidPayload(_) => {
                ErrorCategory::Validation
            }
            CoordinatorError::StoreUnavailable(_)
            | CoordinatorError::DurableStoreUnavailable(_)
            | CoordinatorError::StateConflict => ErrorCategory::Transient,
            CoordinatorError::RoomCodeSpaceExhausted | CoordinatorError::CorruptState(_) => {
                ErrorCategory::Fatal
            }
            _ => ErrorCategory::Conflict,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

impl std::fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorError::RoomNotFound => write!(f, "Room not found"),
            CoordinatorError::RoomFinished => write!(f, "Room has already finished"),
            CoordinatorError::RoomFull => write!(f, "Room is full"),
            CoordinatorError::AlreadyInRoom => write!(f, "You are already in this room"),
            CoordinatorError::AlreadyInActiveRoom(code) => {
                write!(f, "You already have an active room: {}", code)
            }
            CoordinatorError::NotYourSeat => write!(f, "You are not playing that color"),
            CoordinatorError::NotYourTurn => write!(f, "It is not your turn"),
            CoordinatorError::GameInactive => write!(f, "Game is not active"),
            CoordinatorError::OutOfBounds { row, col } => {
                write!(f, "Position ({}, {}) is outside the board", row, col)
            }
            CoordinatorError::CellOccupied { row, col } => {
                write!(f, "Position ({}, {}) is already occupied", row, col)
            }
            CoordinatorError::PermissionDenied => write!(f, "Only seated players can do that"),
            CoordinatorError::WaitingForOpponent => write!(f, "Waiting for an opponent"),
            CoordinatorError::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),
            CoordinatorError::StoreUnavailable(msg) => {
                write!(f, "Game state temporarily unavailable, try again: {}", msg)
            }
            CoordinatorError::DurableStoreUnavailable(msg) => {
                write!(f, "Room storage temporarily unavailable, try again: {}", msg)
            }
            CoordinatorError::StateConflict => {
                write!(f, "Room changed while your request ran, try again")
            }
            CoordinatorError::RoomCodeSpaceExhausted => {
                write!(f, "Could not allocate a room code")
            }
            CoordinatorError::CorruptState(msg) => write!(f, "Room state is corrupt: {}", msg),
        }
    }
}

impl std::error::Error for CoordinatorError {}

impl From<StateStoreError> for CoordinatorError {
    fn from(err: StateStoreError) -> Self {
        match err {
            StateStoreError::Serialization(msg) => CoordinatorError::CorruptState(msg),
            other => CoordinatorError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<RoomRepositoryError> for CoordinatorError {
    fn from(err: RoomRepositoryError) -> Self {
        match err {
            RoomRepositoryError::NotFound => CoordinatorError::RoomNotFound,
            RoomRepositoryError::Serialization(msg) => CoordinatorError::CorruptState(msg),
            other => CoordinatorError::DurableStoreUnavailable(other.to_string()),
        }
    }
}

impl From<PlayerRepositoryError> for CoordinatorError {
    fn from(err: PlayerRepositoryError) -> Self {
        CoordinatorError::DurableStoreUnavailable(err.to_string())
    }
}

impl From<GameRecordRepositoryError> for CoordinatorError {
    fn from(err: GameRecordRepositoryError) -> Self {
        CoordinatorError::DurableStoreUnavailable(err.to_string())
    }
}
