use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying store could not be reached. Callers must keep this
    /// distinct from "key absent".
    #[error("key/value store unavailable: {0}")]
    Unavailable(String),
}

/// Contract of the external key/value service: point get/set/delete with a
/// per-key expiry applied at write time. Single-key operations are assumed
/// atomic at the store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;
    /// Absent (expired or never written) is `Ok(None)`, not an error.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Deleting a missing key is a no-op.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Default in-process store. Expiry is lazy on read plus a periodic sweep;
/// reads never extend a key's lifetime.
#[derive(Clone, Default)]
pub struct MemoryKv {
    map: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired keys. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut w = self.map.write();
        let expired: Vec<String> = w
            .iter()
            .filter(|(_, e)| now >= e.expires_at)
            .map(|(k, _)| k.clone())
            .collect();
        let n = expired.len();
        for k in expired {
            w.remove(&k);
        }
        n
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let entry = Entry { value, expires_at: Instant::now() + ttl };
        self.map.write().insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        {
            let r = self.map.read();
            match r.get(key) {
                None => return Ok(None),
                Some(e) if Instant::now() < e.expires_at => return Ok(Some(e.value.clone())),
                Some(_) => {}
            }
        }
        // Expired: prune under the write lock and report absent.
        self.map.write().remove(key);
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.map.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn value_lives_until_ttl_and_not_beyond() {
        let kv = MemoryKv::new();
        kv.set("k", "v".into(), Duration::from_millis(80)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(kv.get("k").await.unwrap(), None);
        // The expired entry was pruned on read.
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn reads_do_not_extend_expiry() {
        let kv = MemoryKv::new();
        kv.set("k", "v".into(), Duration::from_millis(90)).await.unwrap();
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            let _ = kv.get("k").await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_is_a_noop_on_missing_keys() {
        let kv = MemoryKv::new();
        kv.delete("never-written").await.unwrap();
        kv.set("k", "v".into(), Duration::from_secs(60)).await.unwrap();
        kv.delete("k").await.unwrap();
        kv.delete("k").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn overwrite_replaces_value_and_ttl() {
        let kv = MemoryKv::new();
        kv.set("k", "old".into(), Duration::from_millis(10)).await.unwrap();
        kv.set("k", "new".into(), Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(kv.get("k").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_keys() {
        let kv = MemoryKv::new();
        kv.set("short", "a".into(), Duration::from_millis(10)).await.unwrap();
        kv.set("long", "b".into(), Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(kv.sweep(), 1);
        assert_eq!(kv.len(), 1);
        assert_eq!(kv.get("long").await.unwrap(), Some("b".to_string()));
    }
}
