//! In-memory counter store.
//!
//! Process-local backend over a concurrent map, for single-instance
//! deployments and tests. Entries expire lazily: expired entries read as
//! absent, and [`MemoryStore::purge_expired`] reclaims their memory.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::backend::{CounterStore, StoreError, StoreValue};

/// One stored entry: the raw payload plus its expiry deadline.
#[derive(Debug, Clone)]
struct Entry {
    raw: String,
    expires_at: Instant,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Counter store backed by a process-local concurrent map.
///
/// Matches the remote store's counter semantics: increments attach the
/// expiry only when they create the key, and an expired entry behaves
/// exactly like an absent one. The map shards its locks, so operations on
/// different keys do not contend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Drop expired entries. Lazy expiry already hides them from reads;
    /// this reclaims the memory.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.expired(now));
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expiry deadline for a live key. Lets tests assert that increments
    /// within a window leave the deadline untouched.
    #[cfg(test)]
    pub(crate) fn expiry_deadline(&self, key: &str) -> Option<Instant> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.expired(now))
            .map(|entry| entry.expires_at)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, key: &str, ttl_seconds: u64) -> Result<u64, StoreError> {
        let now = Instant::now();
        // The entry guard holds the shard lock for this key, which makes
        // the read-bump-write below atomic with respect to other callers.
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            raw: "0".to_string(),
            expires_at: now + Duration::from_secs(ttl_seconds),
        });
        if entry.expired(now) {
            // The previous window lapsed; this increment re-creates the key.
            entry.raw = "0".to_string();
            entry.expires_at = now + Duration::from_secs(ttl_seconds);
        }
        let current = entry
            .raw
            .trim()
            .parse::<u64>()
            .map_err(|_| StoreError::Unavailable(format!("value at {key} is not an integer")))?
            + 1;
        entry.raw = current.to_string();
        Ok(current)
    }

    async fn get(&self, key: &str) -> Result<Option<StoreValue>, StoreError> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| !entry.expired(now))
            .map(|entry| StoreValue::decode(&entry.raw)))
    }

    async fn set(
        &self,
        key: &str,
        value: StoreValue,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                raw: value.encode(),
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
            },
        );
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        let now = Instant::now();
        let remaining = self.entries.get(key).filter(|e| !e.expired(now)).map(|e| {
            let left = e.expires_at.duration_since(now);
            // Round up, so a key with any time left never reports zero.
            let secs = left.as_secs();
            if left.subsec_nanos() > 0 {
                secs as i64 + 1
            } else {
                secs as i64
            }
        });
        Ok(remaining.unwrap_or(-1))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn expired_entry(raw: &str) -> Entry {
        Entry {
            raw: raw.to_string(),
            expires_at: Instant::now() - Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_increment_counts_from_one() {
        let store = MemoryStore::new();
        assert_eq!(store.increment("counter", 60).await.unwrap(), 1);
        assert_eq!(store.increment("counter", 60).await.unwrap(), 2);
        assert_eq!(store.increment("counter", 60).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_increment_does_not_refresh_expiry() {
        let store = MemoryStore::new();
        store.increment("counter", 60).await.unwrap();
        let deadline = store.expiry_deadline("counter").unwrap();

        for _ in 0..5 {
            store.increment("counter", 60).await.unwrap();
        }
        assert_eq!(store.expiry_deadline("counter"), Some(deadline));
    }

    #[tokio::test]
    async fn test_expired_entry_reads_absent() {
        let store = MemoryStore::new();
        store.entries.insert("stale".to_string(), expired_entry("41"));

        assert_eq!(store.get("stale").await.unwrap(), None);
        assert_eq!(store.ttl("stale").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_increment_restarts_expired_counter() {
        let store = MemoryStore::new();
        store.entries.insert("stale".to_string(), expired_entry("41"));

        assert_eq!(store.increment("stale", 60).await.unwrap(), 1);
        assert!(store.expiry_deadline("stale").is_some());
    }

    #[tokio::test]
    async fn test_set_get_auto_decodes() {
        let store = MemoryStore::new();
        store
            .set("json", StoreValue::from(json!({"plan": "free"})), 60)
            .await
            .unwrap();
        store.set("text", StoreValue::from("hello"), 60).await.unwrap();

        assert_eq!(
            store.get("json").await.unwrap(),
            Some(StoreValue::Json(json!({"plan": "free"})))
        );
        assert_eq!(
            store.get("text").await.unwrap(),
            Some(StoreValue::Text("hello".to_string()))
        );
    }

    #[tokio::test]
    async fn test_ttl_reports_remaining_seconds() {
        let store = MemoryStore::new();
        store.increment("counter", 3600).await.unwrap();

        let ttl = store.ttl("counter").await.unwrap();
        assert!(ttl > 3590 && ttl <= 3600, "unexpected ttl {ttl}");
        assert_eq!(store.ttl("missing").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.increment("counter", 60).await.unwrap();

        assert_ok!(store.delete("counter").await);
        assert_eq!(store.get("counter").await.unwrap(), None);
        assert_ok!(store.delete("counter").await);
    }

    #[tokio::test]
    async fn test_increment_rejects_non_integer() {
        let store = MemoryStore::new();
        store.set("text", StoreValue::from("hello"), 60).await.unwrap();

        assert_err!(store.increment("text", 60).await);
    }

    #[tokio::test]
    async fn test_purge_drops_only_expired() {
        let store = MemoryStore::new();
        store.increment("live", 3600).await.unwrap();
        store.entries.insert("stale".to_string(), expired_entry("9"));

        store.purge_expired();
        assert_eq!(store.len(), 1);
        assert!(store.get("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let store = MemoryStore::new();
        store.increment("a", 60).await.unwrap();
        store.increment("b", 60).await.unwrap();

        store.clear();
        assert!(store.is_empty());
    }
}
