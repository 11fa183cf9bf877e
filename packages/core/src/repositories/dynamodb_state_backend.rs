use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::models::backend::BackendMode;
use crate::repositories::errors::state_store_errors::StateStoreError;
use crate::repositories::state_store::StateBackend;

/// External State Store backend on a DynamoDB table with partition key `key`,
/// a string `value`, a numeric `version` and an `expires_at` epoch-seconds TTL
/// attribute.
///
/// DynamoDB deletes expired items lazily, so reads also compare `expires_at`
/// against the clock.
pub struct DynamoDbStateBackend {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbStateBackend {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }

    fn expires_at(ttl: Duration) -> i64 {
        Utc::now().timestamp() + ttl.as_secs() as i64
    }

    fn item(key: &str, value: &str, ttl: Duration) -> HashMap<String, AttributeValue> {
        HashMap::from([
            ("key".to_string(), AttributeValue::S(key.to_string())),
            ("value".to_string(), AttributeValue::S(value.to_string())),
            (
                "expires_at".to_string(),
                AttributeValue::N(Self::expires_at(ttl).to_string()),
            ),
        ])
    }

    fn versioned_item(
        key: &str,
        value: &str,
        version: u64,
        ttl: Duration,
    ) -> HashMap<String, AttributeValue> {
        let mut item = Self::item(key, value, ttl);
        item.insert(
            "version".to_string(),
            AttributeValue::N(version.to_string()),
        );
        item
    }

    /// Items written without a version count as version 0.
    fn version_condition(expected: u64) -> &'static str {
        if expected == 0 {
            "attribute_not_exists(#k) OR expires_at <= :now OR #v = :expected OR attribute_not_exists(#v)"
        } else {
            "attribute_not_exists(#k) OR expires_at <= :now OR #v = :expected"
        }
    }

    fn live_value(item: &HashMap<String, AttributeValue>) -> Option<String> {
        let expires_at = item
            .get("expires_at")
            .and_then(|attr| attr.as_n().ok())
            .and_then(|n| n.parse::<i64>().ok())?;
        if expires_at <= Utc::now().timestamp() {
            return None;
        }
        item.get("value")
            .and_then(|attr| attr.as_s().ok())
            .cloned()
    }
}

#[async_trait]
impl StateBackend for DynamoDbStateBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::External
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StateStoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("key", AttributeValue::S(key.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| StateStoreError::Unavailable(DisplayErrorContext(&e).to_string()))?;

        Ok(output.item.as_ref().and_then(Self::live_value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StateStoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::item(key, value, ttl)))
            .send()
            .await
            .map_err(|e| StateStoreError::Unavailable(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::item(key, value, ttl)))
            .condition_expression("attribute_not_exists(#k) OR expires_at <= :now")
            .expression_attribute_names("#k", "key")
            .expression_attribute_values(":now", AttributeValue::N(Utc::now().timestamp().to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error()
                    .is_some_and(|err| err.is_conditional_check_failed_exception())
                {
                    debug!("Key {} already claimed", key);
                    Ok(false)
                } else {
                    Err(StateStoreError::Unavailable(DisplayErrorContext(&e).to_string()))
                }
            }
        }
    }

    async fn set_if_version(
        &self,
        key: &str,
        value: &str,
        expected: u64,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::versioned_item(key, value, expected + 1, ttl)))
            .condition_expression(Self::version_condition(expected))
            .expression_attribute_names("#k", "key")
            .expression_attribute_names("#v", "version")
            .expression_attribute_values(":now", AttributeValue::N(Utc::now().timestamp().to_string()))
            .expression_attribute_values(":expected", AttributeValue::N(expected.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error()
                    .is_some_and(|err| err.is_conditional_check_failed_exception())
                {
                    debug!("Key {} moved past version {}", key, expected);
                    Ok(false)
                } else {
                    Err(StateStoreError::Unavailable(DisplayErrorContext(&e).to_string()))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StateStoreError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("key", AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| StateStoreError::Unavailable(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StateStoreError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn probe(&self) -> Result<(), StateStoreError> {
        self.client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
            .map_err(|e| StateStoreError::Unavailable(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_layout() {
        let item = DynamoDbStateBackend::item("game:ROOM", "{}", Duration::from_secs(60));

        assert_eq!(item.get("key").and_then(|a| a.as_s().ok()).map(String::as_str), Some("game:ROOM"));
        assert_eq!(item.get("value").and_then(|a| a.as_s().ok()).map(String::as_str), Some("{}"));
        assert!(item.contains_key("expires_at"));
    }

    #[test]
    fn test_versioned_item_carries_next_version() {
        let item = DynamoDbStateBackend::versioned_item("game:ROOM", "{}", 4, Duration::from_secs(60));

        assert_eq!(item.get("version").and_then(|a| a.as_n().ok()).map(String::as_str), Some("4"));
        assert!(DynamoDbStateBackend::version_condition(0).contains("attribute_not_exists(#v)"));
        assert!(!DynamoDbStateBackend::version_condition(3).contains("attribute_not_exists(#v)"));
    }

    #[test]
    fn test_live_value_ignores_expired_items() {
        let mut item = DynamoDbStateBackend::item("k", "v", Duration::from_secs(60));
        assert_eq!(DynamoDbStateBackend::live_value(&item).as_deref(), Some("v"));

        item.insert(
            "expires_at".to_string(),
            AttributeValue::N((Utc::now().timestamp() - 1).to_string()),
        );
        assert_eq!(DynamoDbStateBackend::live_value(&item), None);
    }
}
