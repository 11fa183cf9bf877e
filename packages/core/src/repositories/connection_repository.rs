use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::error::DisplayErrorContext as ApiGatewayErrorContext;
use aws_sdk_apigatewaymanagement::primitives::Blob;
use aws_sdk_apigatewaymanagement::Client as ApiGatewayClient;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_dynamo::{from_item, to_item};
use tracing::{debug, info, warn};

use crate::models::participant::Participant;
use crate::repositories::errors::connection_repository_errors::ConnectionRepositoryError;

#[cfg(test)]
use mockall::automock;

/// One open WebSocket connection and who it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub connection_id: String,
    /// [`Identity::key`](crate::models::participant::Identity::key) of the participant.
    pub participant_id: String,
    pub participant: Participant,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionRecord {
    pub fn new(connection_id: &str, participant: &Participant) -> Self {
        ConnectionRecord {
            connection_id: connection_id.to_string(),
            participant_id: participant.key(),
            participant: participant.clone(),
            connected_at: Utc::now(),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn store_connection(&self, record: &ConnectionRecord)
        -> Result<(), ConnectionRepositoryError>;
    async fn get_connection(
        &self,
        connection_id: &str,
    ) -> Result<Option<ConnectionRecord>, ConnectionRepositoryError>;
    async fn remove_connection(&self, connection_id: &str)
        -> Result<(), ConnectionRepositoryError>;
    async fn connections_for(
        &self,
        participant_id: &str,
    ) -> Result<Vec<String>, ConnectionRepositoryError>;
    /// Posts a payload to a connection. A gone connection is removed and
    /// reported as delivered.
    async fn send_message(
        &self,
        connection_id: &str,
        payload: &str,
    ) -> Result<(), ConnectionRepositoryError>;
}

/// Connection table keyed by `connection_id`, with a
/// `GSI_ConnectionByParticipant` index on `participant_id`.
pub struct DynamoDbConnectionRepository {
    dynamodb_client: DynamoDbClient,
    api_gateway_client: ApiGatewayClient,
    table_name: String,
}

impl DynamoDbConnectionRepository {
    pub fn new(
        dynamodb_client: DynamoDbClient,
        api_gateway_client: ApiGatewayClient,
        table_name: &str,
    ) -> Self {
        Self {
            dynamodb_client,
            api_gateway_client,
            table_name: table_name.to_string(),
        }
    }
}

#[async_trait]
impl ConnectionRepository for DynamoDbConnectionRepository {
    async fn store_connection(
        &self,
        record: &ConnectionRecord,
    ) -> Result<(), ConnectionRepositoryError> {
        let item =
            to_item(record).map_err(|e| ConnectionRepositoryError::Serialization(e.to_string()))?;
        self.dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| ConnectionRepositoryError::DynamoDb(DisplayErrorContext(&e).to_string()))?;

        info!(
            "Stored connection {} for participant {}",
            record.connection_id, record.participant_id
        );
        Ok(())
    }

    async fn get_connection(
        &self,
        connection_id: &str,
    ) -> Result<Option<ConnectionRecord>, ConnectionRepositoryError> {
        let output = self
            .dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .key("connection_id", AttributeValue::S(connection_id.to_string()))
            .send()
            .await
            .map_err(|e| ConnectionRepositoryError::DynamoDb(DisplayErrorContext(&e).to_string()))?;

        output
            .item
            .map(|item| {
                from_item(item).map_err(|e| ConnectionRepositoryError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn remove_connection(&self, connection_id: &str) -> Result<(), ConnectionRepositoryError> {
        self.dynamodb_client
            .delete_item()
            .table_name(&self.table_name)
            .key("connection_id", AttributeValue::S(connection_id.to_string()))
            .send()
            .await
            .map_err(|e| ConnectionRepositoryError::DynamoDb(DisplayErrorContext(&e).to_string()))?;

        info!("Removed connection {}", connection_id);
        Ok(())
    }

    async fn connections_for(
        &self,
        participant_id: &str,
    ) -> Result<Vec<String>, ConnectionRepositoryError> {
        let output = self
            .dynamodb_client
            .query()
            .table_name(&self.table_name)
            .index_name("GSI_ConnectionByParticipant")
            .key_condition_expression("participant_id = :participant_id")
            .expression_attribute_values(
                ":participant_id",
                AttributeValue::S(participant_id.to_string()),
            )
            .send()
            .await
            .map_err(|e| ConnectionRepositoryError::DynamoDb(DisplayErrorContext(&e).to_string()))?;

        let connection_ids = output
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                item.get("connection_id")
                    .and_then(|attr| attr.as_s().ok())
                    .cloned()
            })
            .collect();
        Ok(connection_ids)
    }

    async fn send_message(
        &self,
        connection_id: &str,
        payload: &str,
    ) -> Result<(), ConnectionRepositoryError> {
        debug!("Posting to connection {}: {}", connection_id, payload);
        let result = self
            .api_gateway_client
            .post_to_connection()
            .connection_id(connection_id)
            .data(Blob::new(payload.as_bytes()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.as_service_error().is_some_and(|err| err.is_gone_exception()) {
                    warn!("Connection {} is gone, removing it", connection_id);
                    self.remove_connection(connection_id).await
                } else {
                    Err(ConnectionRepositoryError::Delivery(
                        ApiGatewayErrorContext(&e).to_string(),
                    ))
                }
            }
        }
    }
}
