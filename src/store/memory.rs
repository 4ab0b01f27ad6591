use super::LockStore;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct Entry {
    token: String,
    expires_at: Instant,
}

/// In-process store with per-key expiry on the tokio clock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token stored under `key`, ignoring expired entries.
    pub fn holder(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries()?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.token.clone()))
    }

    /// Unconditionally drop `key`, whoever holds it.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries()?.remove(key).is_some())
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("memory store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn conditional_set(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries()?;
        let now = Instant::now();

        if let Some(entry) = entries.get(key) {
            if entry.expires_at > now {
                return Ok(false);
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                token: token.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn compare_delete(&self, key: &str, token: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries()?;
        let now = Instant::now();

        let (expired, owned) = match entries.get(key) {
            Some(entry) => (entry.expires_at <= now, entry.token == token),
            None => return Ok(false),
        };

        if expired || owned {
            entries.remove(key);
        }
        Ok(owned && !expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conditional_set_refuses_live_key() {
        let store = MemoryStore::new();
        assert!(store.conditional_set("k", "a", Duration::from_secs(5)).await.unwrap());
        assert!(!store.conditional_set("k", "b", Duration::from_secs(5)).await.unwrap());
        assert_eq!(store.holder("k").unwrap().as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_key_can_be_taken_over() {
        let store = MemoryStore::new();
        assert!(store.conditional_set("k", "a", Duration::from_millis(100)).await.unwrap());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.holder("k").unwrap(), None);
        assert!(store.conditional_set("k", "b", Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_compare_delete_requires_matching_token() {
        let store = MemoryStore::new();
        store.conditional_set("k", "a", Duration::from_secs(5)).await.unwrap();

        assert!(!store.compare_delete("k", "stale").await.unwrap());
        assert!(store.compare_delete("k", "a").await.unwrap());
        assert!(!store.compare_delete("k", "a").await.unwrap());
    }
}
