use async_trait::async_trait;
use redis::Client as RedisClient;
use serde_json::Value;
use tracing::debug;

use super::{storage_key, CacheError, CacheKey, CachePhase, CacheStore, CACHE_TTL};

/// Redis-backed cache. Entries are written with `SET .. EX` so expiry is
/// enforced by the server.
#[derive(Clone)]
pub struct RedisCacheStore {
    client: RedisClient,
}

impl RedisCacheStore {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, phase: CachePhase, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(storage_key(phase, key))
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        match raw {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, phase: CachePhase, key: &CacheKey, value: &Value) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value)?;
        let storage_key = storage_key(phase, key);
        let mut conn = self.connection().await?;

        redis::cmd("SET")
            .arg(&storage_key)
            .arg(payload)
            .arg("EX")
            .arg(CACHE_TTL.as_secs())
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        debug!(key = %storage_key, "Cached pipeline result");
        Ok(())
    }
}
