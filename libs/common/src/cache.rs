//! Key-value store module for the Vanity Hub services
//!
//! This module provides the `KeyValueStore` abstraction used by the session
//! adapter and the JWT blacklist, a Redis implementation backed by a single
//! multiplexed connection, and an in-process implementation for local runs
//! and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{CacheError, CacheResult};

/// URL scheme selecting the in-process store
pub const MEMORY_URL_SCHEME: &str = "memory://";

/// When a stored value stops being visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Kept until deleted
    Never,
    /// Relative TTL in seconds
    After(u64),
    /// Absolute expiry instant
    At(DateTime<Utc>),
}

/// Minimal key-value capability set needed by the session layer.
///
/// Every call is a single round trip on a single key, so a dropped request
/// never leaves a half-written value behind.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a string value
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Write a string value with the given expiry
    async fn set(&self, key: &str, value: &str, expiry: Expiry) -> CacheResult<()>;

    /// Read and delete a value in one atomic step
    async fn take(&self, key: &str) -> CacheResult<Option<String>>;

    /// Delete a key; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Add a member to a set
    async fn set_add(&self, key: &str, member: &str) -> CacheResult<()>;

    /// Remove a member from a set
    async fn set_remove(&self, key: &str, member: &str) -> CacheResult<()>;

    /// List the members of a set
    async fn set_members(&self, key: &str) -> CacheResult<Vec<String>>;

    /// Check if the store is reachable
    async fn health_check(&self) -> CacheResult<bool>;
}

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379").
    ///   `memory://` selects the in-process store.
    pub fn from_env() -> CacheResult<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        if url.trim().is_empty() {
            return Err(CacheError::Configuration("REDIS_URL is empty".to_string()));
        }

        Ok(RedisConfig { url })
    }
}

/// Open the store selected by the configuration
pub async fn connect(config: &RedisConfig) -> CacheResult<Arc<dyn KeyValueStore>> {
    if config.url.starts_with(MEMORY_URL_SCHEME) {
        warn!("Using in-process key-value store; sessions are not shared between processes");
        return Ok(Arc::new(MemoryStore::new()));
    }

    Ok(Arc::new(RedisPool::new(config).await?))
}

/// Redis-backed store sharing one multiplexed connection
#[derive(Clone)]
pub struct RedisPool {
    connection: MultiplexedConnection,
}

impl RedisPool {
    /// Connect to Redis
    pub async fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let connection = client.get_multiplexed_async_connection().await?;
        info!("Redis client initialized");
        Ok(RedisPool { connection })
    }

    /// Handle onto the shared connection
    fn connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}

#[async_trait]
impl KeyValueStore for RedisPool {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, expiry: Expiry) -> CacheResult<()> {
        let mut conn = self.connection();

        match expiry {
            Expiry::Never => {
                let _: () = conn.set(key, value).await?;
            }
            Expiry::After(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.max(1)).await?;
            }
            Expiry::At(instant) => {
                // EXAT rejects non-positive timestamps
                let at = instant.timestamp().max(1);
                let _: () = redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("EXAT")
                    .arg(at)
                    .query_async(&mut conn)
                    .await?;
            }
        }

        Ok(())
    }

    async fn take(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection();
        let value: Option<String> = redis::cmd("GETDEL").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection();
        let _: u64 = conn.del(key).await?;
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> CacheResult<()> {
        let mut conn = self.connection();
        let _: u64 = conn.sadd(key, member).await?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> CacheResult<()> {
        let mut conn = self.connection();
        let _: u64 = conn.srem(key, member).await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.connection();
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.connection();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[derive(Debug)]
enum MemoryValue {
    Text(String),
    Set(HashSet<String>),
}

#[derive(Debug)]
struct MemoryEntry {
    value: MemoryValue,
    expires_at: Option<DateTime<Utc>>,
}

impl MemoryEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process store with lazy expiry
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, MemoryEntry>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn expires_at(expiry: Expiry) -> Option<DateTime<Utc>> {
        match expiry {
            Expiry::Never => None,
            Expiry::After(ttl) => {
                Some(Utc::now() + chrono::Duration::seconds(ttl.max(1) as i64))
            }
            Expiry::At(instant) => Some(instant),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        let now = Utc::now();

        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
            return Ok(None);
        }

        match entries.get(key) {
            Some(MemoryEntry {
                value: MemoryValue::Text(text),
                ..
            }) => Ok(Some(text.clone())),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, expiry: Expiry) -> CacheResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: MemoryValue::Text(value.to_string()),
                expires_at: Self::expires_at(expiry),
            },
        );
        Ok(())
    }

    async fn take(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        let now = Utc::now();

        match entries.remove(key) {
            Some(MemoryEntry {
                value: MemoryValue::Text(text),
                expires_at,
            }) if expires_at.is_none_or(|at| at > now) => Ok(Some(text)),
            Some(entry @ MemoryEntry {
                value: MemoryValue::Set(_),
                ..
            }) => {
                // GETDEL leaves non-string values alone
                entries.insert(key.to_string(), entry);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> CacheResult<()> {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.to_string()).or_insert(MemoryEntry {
            value: MemoryValue::Set(HashSet::new()),
            expires_at: None,
        });

        if let MemoryValue::Set(members) = &mut entry.value {
            members.insert(member.to_string());
        }
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> CacheResult<()> {
        let mut entries = self.entries.lock().await;
        let now_empty = match entries.get_mut(key) {
            Some(MemoryEntry {
                value: MemoryValue::Set(members),
                ..
            }) => {
                members.remove(member);
                members.is_empty()
            }
            _ => false,
        };

        if now_empty {
            entries.remove(key);
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> CacheResult<Vec<String>> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(MemoryEntry {
                value: MemoryValue::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            _ => Ok(Vec::new()),
        }
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() -> CacheResult<()> {
        let store = MemoryStore::new();

        store.set("test_key", "test_value", Expiry::After(5)).await?;
        assert_eq!(store.get("test_key").await?, Some("test_value".to_string()));

        store.delete("test_key").await?;
        assert_eq!(store.get("test_key").await?, None);

        // deleting twice is fine
        store.delete("test_key").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_absolute_expiry_in_the_past_hides_value() -> CacheResult<()> {
        let store = MemoryStore::new();
        let past = Utc::now() - chrono::Duration::seconds(1);

        store.set("stale", "value", Expiry::At(past)).await?;
        assert_eq!(store.get("stale").await?, None);
        assert_eq!(store.take("stale").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_take_removes_value() -> CacheResult<()> {
        let store = MemoryStore::new();
        store.set("once", "value", Expiry::Never).await?;

        assert_eq!(store.take("once").await?, Some("value".to_string()));
        assert_eq!(store.take("once").await?, None);
        assert_eq!(store.get("once").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_members() -> CacheResult<()> {
        let store = MemoryStore::new();
        store.set_add("members", "a").await?;
        store.set_add("members", "b").await?;
        store.set_add("members", "a").await?;

        let mut members = store.set_members("members").await?;
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);

        store.set_remove("members", "a").await?;
        store.set_remove("members", "b").await?;
        assert!(store.set_members("members").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_selects_memory_store() -> CacheResult<()> {
        let config = RedisConfig {
            url: "memory://".to_string(),
        };

        let store = connect(&config).await?;
        assert!(store.health_check().await?);
        Ok(())
    }
}
