//! Redis-backed counter store.

use std::fmt;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};
use tracing::info;

use super::backend::{CounterStore, StoreError, StoreValue};

/// Server-side increment that attaches the expiry only when the increment
/// creates the key. Keeping both calls in one script closes the gap where
/// a client dies between INCR and EXPIRE, leaving a counter that never
/// resets.
const INCREMENT_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

/// Configuration for the Redis counter store.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Prefix prepended to every key, namespacing this service's counters
    /// (default: "tollgate")
    pub key_prefix: String,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: "tollgate".to_string(),
        }
    }
}

/// Counter store backed by a Redis-compatible service.
///
/// The connection manager multiplexes requests over a single connection
/// and reconnects on failure; cloning the handle per operation keeps
/// concurrent callers from serializing behind a lock.
pub struct RedisStore {
    connection: ConnectionManager,
    config: RedisStoreConfig,
    increment_script: Script,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Clone for RedisStore {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            config: self.config.clone(),
            increment_script: Script::new(INCREMENT_SCRIPT),
        }
    }
}

impl RedisStore {
    /// Connect with default configuration.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Self::connect_with_config(url, RedisStoreConfig::default()).await
    }

    /// Connect with custom configuration.
    pub async fn connect_with_config(
        url: &str,
        config: RedisStoreConfig,
    ) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        info!(prefix = %config.key_prefix, "Connected to counter store");

        Ok(Self {
            connection,
            config,
            increment_script: Script::new(INCREMENT_SCRIPT),
        })
    }

    fn key(&self, suffix: &str) -> String {
        prefixed(&self.config.key_prefix, suffix)
    }

    /// Round-trip liveness probe, for health checks at startup or behind
    /// a readiness endpoint.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

fn prefixed(prefix: &str, suffix: &str) -> String {
    format!("{prefix}:{suffix}")
}

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn increment(&self, key: &str, ttl_seconds: u64) -> Result<u64, StoreError> {
        let key = self.key(key);
        let mut conn = self.connection.clone();
        let current: u64 = self
            .increment_script
            .key(&key)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await?;
        Ok(current)
    }

    async fn get(&self, key: &str) -> Result<Option<StoreValue>, StoreError> {
        let key = self.key(key);
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(&key).await?;
        Ok(raw.map(|raw| StoreValue::decode(&raw)))
    }

    async fn set(
        &self,
        key: &str,
        value: StoreValue,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        let key = self.key(key);
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(&key, value.encode(), ttl_seconds)
            .await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        let key = self.key(key);
        let mut conn = self.connection.clone();
        let ttl: i64 = conn.ttl(&key).await?;
        // Redis answers -2 for an absent key and -1 for a key with no
        // expiry; callers only care that there is nothing to wait for.
        Ok(if ttl < 0 { -1 } else { ttl })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let key = self.key(key);
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(&key).await?;
        Ok(())
    }
}
