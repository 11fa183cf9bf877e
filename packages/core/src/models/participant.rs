use serde::{Deserialize, Serialize};

/// Who a participant is, as far as persistence is concerned.
///
/// Registered ids are stable account ids owned by the auth collaborator and may
/// be written to the durable store. Guest ids are chosen by the client and are
/// never written there. A guest and an account sharing the same id string are
/// different identities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    Registered(String),
    Guest(String),
}

impl Identity {
    pub fn id(&self) -> &str {
        match self {
            Identity::Registered(id) | Identity::Guest(id) => id,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Identity::Guest(_))
    }

    /// Id qualified by its kind, used for locks, claims and connection lookups.
    pub fn key(&self) -> String {
        match self {
            Identity::Registered(id) => format!("account:{}", id),
            Identity::Guest(id) => format!("guest:{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub identity: Identity,
    pub display_name: String,
}

impl Participant {
    pub fn registered(account_id: &str, display_name: &str) -> Self {
        Participant {
            identity: Identity::Registered(account_id.to_string()),
            display_name: display_name.to_string(),
        }
    }

    pub fn guest(guest_id: &str, display_name: &str) -> Self {
        Participant {
            identity: Identity::Guest(guest_id.to_string()),
            display_name: display_name.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        self.identity.id()
    }

    pub fn is_guest(&self) -> bool {
        self.identity.is_guest()
    }

    pub fn key(&self) -> String {
        self.identity.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_tag_decides_guest() {
        // A guest whose id looks like a uuid is still a guest.
        let guest = Participant::guest("3f1c2d4e-0000-4000-8000-000000000000", "Anon");
        let member = Participant::registered("guest_123", "Member");

        assert!(guest.is_guest());
        assert!(!member.is_guest());
        assert_eq!(member.id(), "guest_123");
    }

    #[test]
    fn test_guest_never_shares_a_key_with_an_account() {
        let account = Identity::Registered("acc-ann".to_string());
        let lookalike = Identity::Guest("acc-ann".to_string());

        assert_ne!(account, lookalike);
        assert_ne!(account.key(), lookalike.key());
        assert_eq!(lookalike.key(), "guest:acc-ann");
    }

    #[test]
    fn test_identity_serialization() {
        let identity = Identity::Guest("g-1".to_string());
        let serialized = serde_json::to_string(&identity).unwrap();
        assert_eq!(serialized, r#"{"kind":"guest","id":"g-1"}"#);

        let deserialized: Identity = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, identity);
    }
}
