#[derive(Debug, Clone, PartialEq)]
pub enum StateStoreError {
    Unavailable(String),
    Timeout(String),
    Serialization(String),
}

impl std::fmt::Display for StateStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateStoreError::Unavailable(msg) => write!(f, "State store unavailable: {}", msg),
            StateStoreError::Timeout(msg) => write!(f, "State store timed out: {}", msg),
            StateStoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StateStoreError {}
