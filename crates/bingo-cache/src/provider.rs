//! Store manager that dispatches to the configured backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use bingo_core::config::cache::CacheConfig;
use bingo_core::error::AppError;
use bingo_core::result::AppResult;
use bingo_core::traits::store::{MessageStream, StateStore};

/// Store manager that wraps the configured state store backend.
///
/// The backend is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct StoreManager {
    inner: Arc<dyn StateStore>,
}

impl StoreManager {
    /// Create a new store manager from configuration.
    pub async fn new(config: &CacheConfig) -> AppResult<Self> {
        let inner: Arc<dyn StateStore> = match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis state store");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                Arc::new(crate::redis::RedisStateStore::new(client))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory state store");
                Arc::new(crate::memory::MemoryStateStore::new(&config.memory))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown cache provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a store manager from an existing backend (for testing).
    pub fn from_store(store: Arc<dyn StateStore>) -> Self {
        Self { inner: store }
    }

    /// Shared handle to the inner backend.
    pub fn store(&self) -> Arc<dyn StateStore> {
        Arc::clone(&self.inner)
    }
}

#[async_trait]
impl StateStore for StoreManager {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        self.inner.set_nx(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        self.inner.delete(key).await
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> AppResult<bool> {
        self.inner.delete_if_eq(key, expected).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        self.inner.expire(key, ttl).await
    }

    async fn expire_if_eq(&self, key: &str, expected: &str, ttl: Duration) -> AppResult<bool> {
        self.inner.expire_if_eq(key, expected, ttl).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.inner.exists(key).await
    }

    async fn hget(&self, key: &str, field: &str) -> AppResult<Option<String>> {
        self.inner.hget(key, field).await
    }

    async fn hgetall(&self, key: &str) -> AppResult<HashMap<String, String>> {
        self.inner.hgetall(key).await
    }

    async fn hset_many(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> AppResult<()> {
        self.inner.hset_many(key, fields, ttl).await
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> AppResult<()> {
        self.inner.hdel(key, fields).await
    }

    async fn sadd(&self, key: &str, member: &str, ttl: Duration) -> AppResult<bool> {
        self.inner.sadd(key, member, ttl).await
    }

    async fn srem(&self, key: &str, member: &str) -> AppResult<bool> {
        self.inner.srem(key, member).await
    }

    async fn smembers(&self, key: &str) -> AppResult<Vec<String>> {
        self.inner.smembers(key).await
    }

    async fn sismember(&self, key: &str, member: &str) -> AppResult<bool> {
        self.inner.sismember(key, member).await
    }

    async fn scard(&self, key: &str) -> AppResult<u64> {
        self.inner.scard(key).await
    }

    async fn zadd_nx(&self, key: &str, member: &str, score: f64, ttl: Duration) -> AppResult<bool> {
        self.inner.zadd_nx(key, member, score, ttl).await
    }

    async fn zrange_all(&self, key: &str) -> AppResult<Vec<String>> {
        self.inner.zrange_all(key).await
    }

    async fn zcard(&self, key: &str) -> AppResult<u64> {
        self.inner.zcard(key).await
    }

    async fn publish(&self, channel: &str, payload: &str) -> AppResult<()> {
        self.inner.publish(channel, payload).await
    }

    async fn subscribe(&self, channel: &str) -> AppResult<MessageStream> {
        self.inner.subscribe(channel).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
