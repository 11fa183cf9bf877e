use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::Client;
use serde_dynamo::to_item;
use tracing::info;

use crate::models::game_record::GameRecord;
use crate::repositories::errors::game_record_repository_errors::GameRecordRepositoryError;

#[cfg(test)]
use mockall::automock;

/// Write-once archive of finished games between registered players.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GameRecordRepository: Send + Sync {
    async fn save_record(&self, record: &GameRecord) -> Result<(), GameRecordRepositoryError>;
}

pub struct DynamoDbGameRecordRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbGameRecordRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }
}

#[async_trait]
impl GameRecordRepository for DynamoDbGameRecordRepository {
    async fn save_record(&self, record: &GameRecord) -> Result<(), GameRecordRepositoryError> {
        let item =
            to_item(record).map_err(|e| GameRecordRepositoryError::Serialization(e.to_string()))?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await
            .map_err(|e| GameRecordRepositoryError::DynamoDb(DisplayErrorContext(&e).to_string()))?;

        info!(
            "Stored game record {} for room {}",
            record.id, record.room_code
        );
        Ok(())
    }
}
