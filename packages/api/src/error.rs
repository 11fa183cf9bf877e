use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use gomoku_core::services::errors::coordinator_errors::{CoordinatorError, ErrorCategory};
use gomoku_core::services::errors::identity_errors::IdentityError;
use gomoku_core::services::errors::player_service_errors::PlayerServiceError;

#[derive(Debug)]
pub enum ApiError {
    Coordinator(CoordinatorError),
    PlayerService(PlayerServiceError),
    Identity(IdentityError),
}

impl From<CoordinatorError> for ApiError {
    fn from(error: CoordinatorError) -> Self {
        ApiError::Coordinator(error)
    }
}

impl From<PlayerServiceError> for ApiError {
    fn from(error: PlayerServiceError) -> Self {
        ApiError::PlayerService(error)
    }
}

impl From<IdentityError> for ApiError {
    fn from(error: IdentityError) -> Self {
        ApiError::Identity(error)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Coordinator(CoordinatorError::RoomNotFound) => StatusCode::NOT_FOUND,
            ApiError::Coordinator(e) => match e.category() {
                ErrorCategory::Validation => StatusCode::BAD_REQUEST,
                ErrorCategory::Conflict => StatusCode::CONFLICT,
                ErrorCategory::Transient => StatusCode::SERVICE_UNAVAILABLE,
                ErrorCategory::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
            },

            ApiError::PlayerService(PlayerServiceError::ValidationError(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PlayerService(PlayerServiceError::PlayerNotFound) => StatusCode::NOT_FOUND,
            ApiError::PlayerService(PlayerServiceError::Unavailable) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::PlayerService(PlayerServiceError::RepositoryError(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            ApiError::Identity(IdentityError::Lookup(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Identity(IdentityError::InactiveAccount) => StatusCode::FORBIDDEN,
            ApiError::Identity(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Coordinator(e) => e.kind(),
            ApiError::PlayerService(PlayerServiceError::ValidationError(_)) => "ValidationError",
            ApiError::PlayerService(PlayerServiceError::PlayerNotFound) => "PlayerNotFound",
            ApiError::PlayerService(PlayerServiceError::Unavailable) => "Unavailable",
            ApiError::PlayerService(PlayerServiceError::RepositoryError(_)) => "RepositoryError",
            ApiError::Identity(IdentityError::AuthRequired) => "AuthRequired",
            ApiError::Identity(IdentityError::InactiveAccount) => "InactiveAccount",
            ApiError::Identity(IdentityError::Lookup(_)) => "Unavailable",
            ApiError::Identity(_) => "InvalidCredential",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Coordinator(e) => e.to_string(),
            ApiError::PlayerService(e) => e.to_string(),
            ApiError::Identity(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.kind(),
            "message": self.message(),
        });
        (self.status(), Json(body)).into_response()
    }
}
