use serde::{Deserialize, Serialize};

/// Identity snapshot captured at login so identity-bearing endpoints never
/// need a backend round-trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub userid: String,
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
}

impl UserProfile {
    /// Shape returned to the browser; the backend user id stays server-side.
    pub fn public_json(&self) -> serde_json::Value {
        serde_json::json!({
            "username": self.username,
            "name": self.name,
            "surname": self.surname,
        })
    }
}
