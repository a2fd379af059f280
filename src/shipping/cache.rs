use std::time::Duration;

use moka::future::Cache;
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::{Serialize, de::DeserializeOwned};

/// Key-value store in front of the carrier's lookup endpoints.
///
/// Values are stored as JSON strings so both backends hold the same payload.
/// Failures are logged and reported as a miss; the caller then asks the
/// carrier directly.
#[derive(Clone)]
pub enum ShippingCache {
    Redis {
        conn: ConnectionManager,
        ttl: Duration,
    },
    Memory(Cache<String, String>),
}

impl ShippingCache {
    pub async fn redis(redis_url: &str, ttl: Duration) -> anyhow::Result<Self> {
        let config = redis::aio::ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(500));
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager_with_config(config).await?;
        Ok(Self::Redis { conn, ttl })
    }

    pub fn memory(ttl: Duration) -> Self {
        Self::Memory(
            Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        )
    }

    async fn get_raw(&self, key: &str) -> Option<String> {
        match self {
            Self::Redis { conn, .. } => {
                let mut conn = conn.clone();
                let result: redis::RedisResult<Option<String>> = conn.get(key).await;
                match result {
                    Ok(value) => value,
                    Err(err) => {
                        tracing::warn!(error = %err, key, "cache read failed");
                        None
                    }
                }
            }
            Self::Memory(cache) => cache.get(key).await,
        }
    }

    async fn set_raw(&self, key: &str, value: String) {
        match self {
            Self::Redis { conn, ttl } => {
                let mut conn = conn.clone();
                let result: redis::RedisResult<()> =
                    conn.set_ex(key, value, ttl.as_secs().max(1)).await;
                if let Err(err) = result {
                    tracing::warn!(error = %err, key, "cache write failed");
                }
            }
            Self::Memory(cache) => cache.insert(key.to_string(), value).await,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key, "shipping cache hit");
                Some(value)
            }
            Err(err) => {
                tracing::warn!(error = %err, key, "discarding undecodable cache entry");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, raw).await,
            Err(err) => tracing::warn!(error = %err, key, "cache entry could not be encoded"),
        }
    }

    /// Cache-aside read: serve `key` from the cache, otherwise run `fetch`
    /// and store its result. Errors from `fetch` are returned uncached.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: &str, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get_json(key).await {
            return Ok(value);
        }
        tracing::debug!(key, "shipping cache miss");
        let value = fetch().await?;
        self.set_json(key, &value).await;
        Ok(value)
    }
}
