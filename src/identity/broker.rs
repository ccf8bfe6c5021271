use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::record::SessionRecord;
use super::store::SessionStore;
use super::user::UserProfile;
use crate::error::{GatewayError, GatewayResult};
use crate::rpc::RpcClient;

/// Outcome of a successful login: the new opaque session id (for the cookie)
/// and the identity snapshot (for immediate display).
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session_id: String,
    pub user: UserProfile,
}

/// The only component that mints or destroys session records.
#[derive(Clone)]
pub struct AuthBroker {
    rpc: Arc<RpcClient>,
    sessions: SessionStore,
}

impl AuthBroker {
    pub fn new(rpc: Arc<RpcClient>, sessions: SessionStore) -> Self {
        Self { rpc, sessions }
    }

    /// Exchange credentials for a backend token, capture the identity
    /// snapshot, and persist a fresh session record. No record is created on
    /// any failure; the error kind passes through untouched.
    pub async fn login(&self, username: &str, password: &str) -> GatewayResult<LoginOutcome> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(GatewayError::validation("username and password are required"));
        }

        let token = self
            .rpc
            .call("user.login", json!({"username": username, "password": password}), None)
            .await?;
        let auth_token = token
            .as_str()
            .ok_or_else(|| GatewayError::backend("login did not return a token"))?
            .to_string();

        // Second, dependent call: the backend does not bundle the profile
        // into the login response.
        let found = self
            .rpc
            .call(
                "user.get",
                json!({
                    "output": ["userid", "username", "name", "surname"],
                    "filter": { "username": username }
                }),
                Some(&auth_token),
            )
            .await?;
        let user: UserProfile = found
            .as_array()
            .and_then(|a| a.first())
            .cloned()
            .ok_or_else(|| GatewayError::backend("profile lookup returned no user"))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| GatewayError::backend(format!("malformed user profile: {e}")))
            })?;

        let session_id = Uuid::new_v4().to_string();
        let record = SessionRecord { auth_token, user: user.clone() };
        self.sessions.put(&session_id, &record).await?;
        info!(username, session_id, "login ok");
        Ok(LoginOutcome { session_id, user })
    }

    /// Destroy a session. Absent sessions count as already logged out, so the
    /// operation never errors for stale or never-issued ids.
    pub async fn logout(&self, session_id: &str) -> GatewayResult<()> {
        let Some(record) = self.sessions.get(session_id).await? else {
            return Ok(());
        };
        self.invalidate_backend_token(&record.auth_token).await;
        self.sessions.delete(session_id).await?;
        info!(session_id, "logout ok");
        Ok(())
    }

    /// Best effort: backend-side token invalidation must never block local
    /// session destruction.
    async fn invalidate_backend_token(&self, auth_token: &str) {
        if let Err(e) = self.rpc.call("user.logout", json!([]), Some(auth_token)).await {
            warn!(error = %e, "backend logout failed, destroying local session anyway");
        }
    }
}
