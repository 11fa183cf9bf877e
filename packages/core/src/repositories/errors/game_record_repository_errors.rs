#[derive(Debug, Clone, PartialEq)]
pub enum GameRecordRepositoryError {
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for GameRecordRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameRecordRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            GameRecordRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for GameRecordRepositoryError {}
