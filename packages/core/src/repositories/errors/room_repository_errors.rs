#[derive(Debug, Clone, PartialEq)]
pub enum RoomRepositoryError {
    NotFound,
    AlreadyExists,
    GuestIdentity(String),
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for RoomRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomRepositoryError::NotFound => write!(f, "Room not found"),
            RoomRepositoryError::AlreadyExists => write!(f, "Room already exists"),
            RoomRepositoryError::GuestIdentity(id) => {
                write!(f, "Guest identity {} cannot be stored durably", id)
            }
            RoomRepositoryError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            RoomRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for RoomRepositoryError {}
