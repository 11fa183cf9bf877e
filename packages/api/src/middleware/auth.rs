use axum::{extract::FromRequestParts, http::request::Parts};

use gomoku_core::models::participant::Participant;
use gomoku_core::services::errors::identity_errors::IdentityError;

use crate::{error::ApiError, state::AppState};

/// The caller behind a `Bearer` credential, registered or guest.
#[derive(Debug, Clone)]
pub struct AuthenticatedParticipant(pub Participant);

impl FromRequestParts<AppState> for AuthenticatedParticipant {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .ok_or(ApiError::Identity(IdentityError::AuthRequired))?
            .to_str()
            .map_err(|_| ApiError::Identity(IdentityError::InvalidToken))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Identity(IdentityError::AuthRequired))?;

        let participant = state.engine.identity.resolve(Some(token)).await?;
        Ok(AuthenticatedParticipant(participant))
    }
}
