use serde::{Deserialize, Serialize};

use super::user::UserProfile;

/// Server-side state for one authenticated browser session: the backend's
/// bearer token plus the identity snapshot captured at login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub auth_token: String,
    pub user: UserProfile,
}
