#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionRepositoryError {
    Serialization(String),
    DynamoDb(String),
    Delivery(String),
}

impl std::fmt::Display for ConnectionRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            ConnectionRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
            ConnectionRepositoryError::Delivery(msg) => {
                write!(f, "Failed to deliver message: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConnectionRepositoryError {}
