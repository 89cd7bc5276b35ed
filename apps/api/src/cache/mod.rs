//! Result cache keyed by [`CacheKey`] and research phase.
//!
//! The engine only derives keys; storage is an injected [`CacheStore`].
//! Redis in deployment, memory when no `REDIS_URL` is configured and in tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod key;
pub mod redis_store;

pub use key::{derive_cache_key, CacheKey};
pub use redis_store::RedisCacheStore;

/// Cached research results live for 30 days.
pub const CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const KEY_PREFIX: &str = "hireflow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePhase {
    Quick,
    Deep,
}

impl CachePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePhase::Quick => "quick",
            CachePhase::Deep => "deep",
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Namespaced storage key: `hireflow:{phase}:{digest}`.
pub fn storage_key(phase: CachePhase, key: &CacheKey) -> String {
    format!("{KEY_PREFIX}:{}:{key}", phase.as_str())
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, phase: CachePhase, key: &CacheKey) -> Result<Option<Value>, CacheError>;

    async fn put(&self, phase: CachePhase, key: &CacheKey, value: &Value) -> Result<(), CacheError>;
}

/// Process-local store with the same TTL semantics as Redis.
pub struct MemoryCacheStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Value)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_ttl(CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, phase: CachePhase, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        let storage_key = storage_key(phase, key);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let fresh = entries
            .get(&storage_key)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, value)| value.clone());
        if fresh.is_none() {
            entries.remove(&storage_key);
        }
        Ok(fresh)
    }

    /// Expired entries are swept on every write so keys that are never read
    /// again do not accumulate.
    async fn put(&self, phase: CachePhase, key: &CacheKey, value: &Value) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
        entries.insert(storage_key(phase, key), (Instant::now(), value.clone()));
        Ok(())
    }
}
