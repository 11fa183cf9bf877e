use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use jsonwebtoken::{decode, DecodingKey, Validation};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::auth::{GuestToken, SessionAccount, TokenClaims};
use crate::models::participant::Participant;
use crate::repositories::errors::player_repository_errors::PlayerRepositoryError;
use crate::repositories::player_repository::PlayerRepository;
use crate::services::errors::identity_errors::IdentityError;

#[cfg(test)]
use mockall::automock;

const MAX_GUEST_ID_LENGTH: usize = 64;
const MAX_DISPLAY_NAME_LENGTH: usize = 32;

/// The external auth collaborator as seen by the identity bridge.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuthCollaborator: Send + Sync {
    async fn resolve_session(&self, credential: &str) -> Result<SessionAccount, IdentityError>;
    fn guest_token(&self, credential: &str) -> Result<GuestToken, IdentityError>;
}

/// Verifies HS256 session tokens and looks the account up in the players
/// table. Without a players table the token subject is taken as an active
/// account named after itself.
pub struct JwtAuthCollaborator {
    jwt_secret: String,
    players: Option<Arc<dyn PlayerRepository + Send + Sync>>,
}

impl JwtAuthCollaborator {
    pub fn new(jwt_secret: &str, players: Option<Arc<dyn PlayerRepository + Send + Sync>>) -> Self {
        JwtAuthCollaborator {
            jwt_secret: jwt_secret.to_string(),
            players,
        }
    }

    fn verify_token(&self, token: &str) -> Result<TokenClaims, IdentityError> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_ref());
        let validation = Validation::default();

        match decode::<TokenClaims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                let now = Utc::now().timestamp() as usize;
                if token_data.claims.exp < now {
                    Err(IdentityError::ExpiredToken)
                } else {
                    Ok(token_data.claims)
                }
            }
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(IdentityError::ExpiredToken),
                _ => Err(IdentityError::InvalidToken),
            },
        }
    }
}

#[async_trait]
impl AuthCollaborator for JwtAuthCollaborator {
    async fn resolve_session(&self, credential: &str) -> Result<SessionAccount, IdentityError> {
        let claims = self.verify_token(credential)?;
        let Some(players) = &self.players else {
            return Ok(SessionAccount {
                display_name: claims.sub.clone(),
                account_id: claims.sub,
                is_active: true,
            });
        };
        match players.get_player(&claims.sub).await {
            Ok(player) => Ok(SessionAccount {
                account_id: player.id,
                display_name: player.display_name,
                is_active: player.is_active,
            }),
            Err(PlayerRepositoryError::NotFound) => Err(IdentityError::InvalidToken),
            Err(e) => Err(IdentityError::Lookup(e.to_string())),
        }
    }

    fn guest_token(&self, credential: &str) -> Result<GuestToken, IdentityError> {
        let decoded = STANDARD
            .decode(credential.trim())
            .map_err(|_| IdentityError::InvalidToken)?;
        let token: GuestToken =
            serde_json::from_slice(&decoded).map_err(|_| IdentityError::InvalidToken)?;

        let id_is_valid = !token.id.trim().is_empty() && token.id.len() <= MAX_GUEST_ID_LENGTH;
        if token.kind != "guest" || !id_is_valid {
            return Err(IdentityError::InvalidToken);
        }
        Ok(token)
    }
}

/// Turns an inbound credential into a [`Participant`].
pub struct IdentityService {
    auth: Arc<dyn AuthCollaborator + Send + Sync>,
}

impl IdentityService {
    pub fn new(auth: Arc<dyn AuthCollaborator + Send + Sync>) -> Self {
        IdentityService { auth }
    }

    /// Accepts a session credential or, failing that, a guest credential.
    ///
    /// Guest ids are taken as given and tagged as guests; they never become
    /// registered identities.
    pub async fn resolve(&self, credential: Option<&str>) -> Result<Participant, IdentityError> {
        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(IdentityError::AuthRequired)?;

        match self.auth.resolve_session(credential).await {
            Ok(account) if account.is_active => {
                debug!("Resolved registered participant {}", account.account_id);
                return Ok(Participant::registered(
                    &account.account_id,
                    &account.display_name,
                ));
            }
            Ok(account) => {
                warn!("Rejected inactive account {}", account.account_id);
                return Err(IdentityError::InactiveAccount);
            }
            Err(IdentityError::Lookup(msg)) => return Err(IdentityError::Lookup(msg)),
            Err(e) => debug!("Credential is not a session token: {}", e),
        }

        match self.auth.guest_token(credential) {
            Ok(token) => {
                let id = token.id.trim();
                let display_name = guest_display_name(token.username.as_deref(), id);
                debug!("Resolved guest participant {}", id);
                Ok(Participant::guest(id, &display_name))
            }
            Err(_) => Err(IdentityError::AuthRequired),
        }
    }
}

fn guest_display_name(username: Option<&str>, id: &str) -> String {
    match username.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.chars().take(MAX_DISPLAY_NAME_LENGTH).collect(),
        None => format!("Guest-{}", id.chars().take(6).collect::<String>()),
    }
}

/// Base64 guest credential, as a client would build it.
pub fn encode_guest_token(id: &str, username: &str) -> String {
    let token = GuestToken {
        kind: "guest".to_string(),
        id: id.to_string(),
        username: Some(username.to_string()),
    };
    STANDARD.encode(serde_json::json!(token).to_string())
}
