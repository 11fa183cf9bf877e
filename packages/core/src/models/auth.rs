use serde::{Deserialize, Serialize};

/// Claims carried by a signed session credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// Unsigned, self-describing guest credential: base64 of
/// `{"type":"guest","id":"...","username":"..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuestToken {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Account as reported by the auth collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAccount {
    pub account_id: String,
    pub display_name: String,
    pub is_active: bool,
}
