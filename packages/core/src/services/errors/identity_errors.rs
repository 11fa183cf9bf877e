use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum IdentityError {
    AuthRequired,
    InvalidToken,
    ExpiredToken,
    InactiveAccount,
    Lookup(String),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IdentityError::AuthRequired => write!(f, "Authentication required"),
            IdentityError::InvalidToken => write!(f, "Invalid credential"),
            IdentityError::ExpiredToken => write!(f, "Credential has expired"),
            IdentityError::InactiveAccount => write!(f, "Account is inactive"),
            IdentityError::Lookup(msg) => write!(f, "Account lookup failed: {}", msg),
        }
    }
}

impl std::error::Error for IdentityError {}
