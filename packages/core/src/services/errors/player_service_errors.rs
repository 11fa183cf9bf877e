use std::fmt;

use crate::repositories::errors::player_repository_errors::PlayerRepositoryError;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerServiceError {
    ValidationError(String),
    PlayerNotFound,
    Unavailable,
    RepositoryError(String),
}

impl fmt::Display for PlayerServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlayerServiceError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            PlayerServiceError::PlayerNotFound => write!(f, "Player not found"),
            PlayerServiceError::Unavailable => write!(f, "Player statistics are not available"),
            PlayerServiceError::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
        }
    }
}

impl std::error::Error for PlayerServiceError {}

impl From<PlayerRepositoryError> for PlayerServiceError {
    fn from(error: PlayerRepositoryError) -> Self {
        match error {
            PlayerRepositoryError::NotFound => PlayerServiceError::PlayerNotFound,
            other => PlayerServiceError::RepositoryError(other.to_string()),
        }
    }
}
