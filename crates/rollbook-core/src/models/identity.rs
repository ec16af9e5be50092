use serde::{Deserialize, Serialize};

/// The signed-in account as reported by `GET /account`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

impl Identity {
    /// Name shown in the status line: the account name if set, else the email.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_deserializes_account_payload() {
        let json = r#"{
            "$id": "64f0c1",
            "$createdAt": "2024-01-01T00:00:00.000+00:00",
            "name": "",
            "email": "a@b.com",
            "emailVerification": false,
            "prefs": {}
        }"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.id, "64f0c1");
        assert_eq!(identity.email, "a@b.com");
        assert_eq!(identity.display_name(), "a@b.com");
    }

    #[test]
    fn test_display_name_prefers_name() {
        let identity = Identity {
            id: "1".to_string(),
            email: "a@b.com".to_string(),
            name: "Ana Bautista".to_string(),
        };
        assert_eq!(identity.display_name(), "Ana Bautista");
    }
}
