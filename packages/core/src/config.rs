use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::models::backend::BackendSelection;
use crate::repositories::state_store::StateStoreSettings;
use crate::services::room_coordinator::CoordinatorSettings;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Missing(String),
    Invalid { name: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "Missing environment variable {}", name),
            ConfigError::Invalid { name, value } => {
                write!(f, "Invalid value '{}' for {}", value, name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Everything the engine reads from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub state_backend: BackendSelection,
    pub game_state_table: Option<String>,
    pub rooms_table: Option<String>,
    pub players_table: Option<String>,
    pub game_records_table: Option<String>,
    pub connections_table: Option<String>,
    pub websocket_endpoint: Option<String>,
    pub jwt_secret: String,
    pub game_state_ttl: Duration,
    pub room_ttl: Duration,
    pub store_timeout: Duration,
    pub store_retry_attempts: u32,
    pub store_retry_backoff: Duration,
    pub room_code_attempts: u32,
    pub durable_probe_interval: Duration,
}

impl CoordinatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let state_backend = match text("STATE_BACKEND") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "STATE_BACKEND".to_string(),
                value,
            })?,
            None => BackendSelection::Auto,
        };
        let game_state_table = text("GAME_STATE_TABLE");
        if state_backend == BackendSelection::External && game_state_table.is_none() {
            return Err(ConfigError::Missing("GAME_STATE_TABLE".to_string()));
        }

        let jwt_secret =
            text("JWT_SECRET").ok_or_else(|| ConfigError::Missing("JWT_SECRET".to_string()))?;

        Ok(CoordinatorConfig {
            state_backend,
            game_state_table,
            rooms_table: text("ROOMS_TABLE"),
            players_table: text("PLAYERS_TABLE"),
            game_records_table: text("GAME_RECORDS_TABLE"),
            connections_table: text("PLAYER_CONNECTIONS_TABLE"),
            websocket_endpoint: text("WEBSOCKET_API_ENDPOINT"),
            jwt_secret,
            game_state_ttl: Duration::from_secs(number(&text, "GAME_STATE_TTL_SECONDS", 3600)?),
            room_ttl: Duration::from_secs(number(&text, "ROOM_TTL_SECONDS", 86400)?),
            store_timeout: Duration::from_millis(number(&text, "STORE_TIMEOUT_MS", 500)?),
            store_retry_attempts: number(&text, "STORE_RETRY_ATTEMPTS", 3)?,
            store_retry_backoff: Duration::from_millis(number(
                &text,
                "STORE_RETRY_BACKOFF_MS",
                50,
            )?),
            room_code_attempts: number(&text, "ROOM_CODE_ATTEMPTS", 16)?,
            durable_probe_interval: Duration::from_secs(number(
                &text,
                "DURABLE_PROBE_INTERVAL_SECONDS",
                30,
            )?),
        })
    }

    pub fn store_settings(&self) -> StateStoreSettings {
        StateStoreSettings {
            timeout: self.store_timeout,
            retry_attempts: self.store_retry_attempts,
            retry_backoff: self.store_retry_backoff,
            probe_interval: self.durable_probe_interval,
        }
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            game_state_ttl: self.game_state_ttl,
            room_code_attempts: self.room_code_attempts,
        }
    }
}

fn number<T, F>(text: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match text(name) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name: name.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
