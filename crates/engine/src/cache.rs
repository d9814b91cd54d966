//! Key/value stores backing the report cache.
//!
//! [`MemoryCache`] is process-local; [`RedisCache`] (behind the `redis`
//! feature) is shared by every process pointing at the same server.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache payload error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Minimal string store with per-key expiry.
///
/// Every key carries an invalidation generation. [`invalidate`] bumps it and
/// deletes the value in one step; [`set_if_generation`] only writes while the
/// generation still matches, so a value computed before an invalidation can
/// never land after it.
///
/// [`invalidate`]: CacheStore::invalidate
/// [`set_if_generation`]: CacheStore::set_if_generation
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// `Ok(None)` on a miss or an expired key.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
    /// `0` for a key that was never invalidated.
    async fn generation(&self, key: &str) -> Result<u64, CacheError>;
    /// Returns `false` (and writes nothing) when `key` was invalidated since
    /// `generation` was read.
    async fn set_if_generation(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
        generation: u64,
    ) -> Result<bool, CacheError>;
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Slots {
    entries: HashMap<String, Entry>,
    generations: HashMap<String, u64>,
}

impl Slots {
    fn insert(&mut self, key: &str, value: String, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }
}

/// In-process TTL store.
#[derive(Debug, Default)]
pub struct MemoryCache {
    slots: Mutex<Slots>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut slots = self.slots.lock().await;
        let Some(entry) = slots.entries.get(key) else {
            return Ok(None);
        };
        if Instant::now() >= entry.expires_at {
            slots.entries.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.slots.lock().await.insert(key, value, ttl);
        Ok(())
    }

    async fn generation(&self, key: &str) -> Result<u64, CacheError> {
        Ok(self.slots.lock().await.generation(key))
    }

    async fn set_if_generation(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
        generation: u64,
    ) -> Result<bool, CacheError> {
        let mut slots = self.slots.lock().await;
        if slots.generation(key) != generation {
            return Ok(false);
        }
        slots.insert(key, value, ttl);
        Ok(true)
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let mut slots = self.slots.lock().await;
        *slots.generations.entry(key.to_string()).or_insert(0) += 1;
        slots.entries.remove(key);
        Ok(())
    }
}

#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;

#[cfg(feature = "redis")]
mod redis_cache {
    use std::time::Duration;

    use async_trait::async_trait;
    use redis::AsyncCommands;

    use super::{CacheError, CacheStore};

    #[derive(Clone, Debug)]
    pub struct RedisCache {
        client: redis::Client,
    }

    impl RedisCache {
        pub fn new(url: impl AsRef<str>) -> Result<Self, CacheError> {
            Ok(Self {
                client: redis::Client::open(url.as_ref())?,
            })
        }

        async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
            Ok(self.client.get_multiplexed_async_connection().await?)
        }

        /// Fails fast at startup when the server is unreachable.
        pub async fn ping(&self) -> Result<(), CacheError> {
            let mut conn = self.connection().await?;
            let _: Option<String> = conn.get("__ping__").await?;
            Ok(())
        }
    }

    const SET_IF_GENERATION: &str = r#"
local current = tonumber(redis.call("GET", KEYS[2]) or "0") or 0
if current ~= tonumber(ARGV[3]) then
  return 0
end
redis.call("SET", KEYS[1], ARGV[1], "EX", ARGV[2])
return 1
"#;

    fn generation_key(key: &str) -> String {
        format!("{key}:generation")
    }

    #[async_trait]
    impl CacheStore for RedisCache {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            let mut conn = self.connection().await?;
            Ok(conn.get(key).await?)
        }

        async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
            let mut conn = self.connection().await?;
            let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
            Ok(())
        }

        async fn generation(&self, key: &str) -> Result<u64, CacheError> {
            let mut conn = self.connection().await?;
            let current: Option<u64> = conn.get(generation_key(key)).await?;
            Ok(current.unwrap_or(0))
        }

        async fn set_if_generation(
            &self,
            key: &str,
            value: String,
            ttl: Duration,
            generation: u64,
        ) -> Result<bool, CacheError> {
            let mut conn = self.connection().await?;
            let stored: i64 = redis::Script::new(SET_IF_GENERATION)
                .key(key)
                .key(generation_key(key))
                .arg(value)
                .arg(ttl.as_secs().max(1))
                .arg(generation)
                .invoke_async(&mut conn)
                .await?;
            Ok(stored == 1)
        }

        async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
            let mut conn = self.connection().await?;
            let _: () = redis::pipe()
                .atomic()
                .incr(generation_key(key), 1)
                .ignore()
                .del(key)
                .ignore()
                .query_async(&mut conn)
                .await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn memory_cache_expires_entries() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v".to_string(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v".to_string(), Duration::from_secs(10))
            .await
            .unwrap();
        cache.invalidate("k").await.unwrap();
        cache.invalidate("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.generation("k").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn write_behind_an_invalidation_is_refused() {
        let cache = MemoryCache::new();
        let seen = cache.generation("k").await.unwrap();

        cache.invalidate("k").await.unwrap();

        let stored = cache
            .set_if_generation("k", "old".to_string(), Duration::from_secs(10), seen)
            .await
            .unwrap();
        assert!(!stored);
        assert_eq!(cache.get("k").await.unwrap(), None);

        let current = cache.generation("k").await.unwrap();
        assert!(
            cache
                .set_if_generation("k", "new".to_string(), Duration::from_secs(10), current)
                .await
                .unwrap()
        );
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));
    }
}
