use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::{from_item, to_attribute_value, to_item};

use crate::models::player::PlayerStats;
use crate::repositories::errors::player_repository_errors::PlayerRepositoryError;

#[cfg(test)]
use mockall::automock;

pub struct DynamoDbPlayerRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbPlayerRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    async fn get_player(&self, player_id: &str) -> Result<PlayerStats, PlayerRepositoryError>;
    async fn save_player(&self, player: &PlayerStats) -> Result<(), PlayerRepositoryError>;
    /// Active players ordered by rating, highest first.
    async fn top_players(&self, limit: usize) -> Result<Vec<PlayerStats>, PlayerRepositoryError>;
}

#[async_trait]
impl PlayerRepository for DynamoDbPlayerRepository {
    async fn get_player(&self, player_id: &str) -> Result<PlayerStats, PlayerRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(
                "id",
                to_attribute_value(player_id)
                    .map_err(|e| PlayerRepositoryError::Serialization(e.to_string()))?,
            )
            .send()
            .await
            .map_err(|e| PlayerRepositoryError::DynamoDb(DisplayErrorContext(&e).to_string()))?;
        if let Some(item) = output.item {
            let player: PlayerStats =
                from_item(item).map_err(|e| PlayerRepositoryError::Serialization(e.to_string()))?;
            Ok(player)
        } else {
            Err(PlayerRepositoryError::NotFound)
        }
    }

    async fn save_player(&self, player: &PlayerStats) -> Result<(), PlayerRepositoryError> {
        let item =
            to_item(player).map_err(|e| PlayerRepositoryError::Serialization(e.to_string()))?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| PlayerRepositoryError::DynamoDb(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn top_players(&self, limit: usize) -> Result<Vec<PlayerStats>, PlayerRepositoryError> {
        let mut players = Vec::new();
        let mut start_key = None;
        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("is_active = :active")
                .expression_attribute_values(":active", AttributeValue::Bool(true))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| {
                    PlayerRepositoryError::DynamoDb(DisplayErrorContext(&e).to_string())
                })?;

            for item in output.items.unwrap_or_default() {
                let player: PlayerStats = from_item(item)
                    .map_err(|e| PlayerRepositoryError::Serialization(e.to_string()))?;
                players.push(player);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        players.sort_by(|a, b| b.rating.cmp(&a.rating).then(b.games_won.cmp(&a.games_won)));
        players.truncate(limit);
        Ok(players)
    }
}
