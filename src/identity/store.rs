use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::record::SessionRecord;
use crate::error::{GatewayError, GatewayResult};
use crate::storage::{KeyValueStore, StoreError};

const KEY_PREFIX: &str = "session:";

/// Persistence boundary for session records. Owns the key namespace and the
/// wire format; nothing else in the gateway touches the underlying store.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(session_id: &str) -> String {
        format!("{KEY_PREFIX}{session_id}")
    }

    pub async fn put(&self, session_id: &str, record: &SessionRecord) -> GatewayResult<()> {
        let body = serde_json::to_string(record)
            .map_err(|e| GatewayError::infra(format!("session serialize failed: {e}")))?;
        self.kv.set(&Self::key(session_id), body, self.ttl).await.map_err(into_infra)
    }

    /// Absent covers missing, expired and corrupt records; a store outage is
    /// an infrastructure error instead.
    pub async fn get(&self, session_id: &str) -> GatewayResult<Option<SessionRecord>> {
        let key = Self::key(session_id);
        let Some(raw) = self.kv.get(&key).await.map_err(into_infra)? else {
            return Ok(None);
        };
        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(session_id, error = %e, "invalid session payload, deleting key");
                let _ = self.kv.delete(&key).await;
                Ok(None)
            }
        }
    }

    pub async fn delete(&self, session_id: &str) -> GatewayResult<()> {
        self.kv.delete(&Self::key(session_id)).await.map_err(into_infra)
    }
}

fn into_infra(err: StoreError) -> GatewayError {
    GatewayError::infra(err.to_string())
}
