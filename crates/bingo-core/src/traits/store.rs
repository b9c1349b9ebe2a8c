//! Shared State Store trait for pluggable backends.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::result::AppResult;

/// Stream of raw payloads received on a subscribed channel.
pub type MessageStream = BoxStream<'static, String>;

/// An external, crash-independent key/value store shared by every engine
/// instance (Redis in production, in-memory for single-process runs).
///
/// Every write takes a TTL; expired entries are invisible to every read.
/// Implementations are responsible for key prefixing.
#[async_trait]
pub trait StateStore: Send + Sync + std::fmt::Debug + 'static {
    /// Get a string value. `None` if missing or expired.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Set a string value with a TTL, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()>;

    /// Set a value only if the key does not exist (NX).
    /// Returns `true` if the value was set.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool>;

    /// Delete a key of any type. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> AppResult<bool>;

    /// Delete a string key only if its value equals `expected`.
    async fn delete_if_eq(&self, key: &str, expected: &str) -> AppResult<bool>;

    /// Reset the TTL of an existing key. Returns `false` if it does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool>;

    /// Reset the TTL of a string key only if its value equals `expected`.
    async fn expire_if_eq(&self, key: &str, expected: &str, ttl: Duration) -> AppResult<bool>;

    /// Whether a key exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Read one hash field.
    async fn hget(&self, key: &str, field: &str) -> AppResult<Option<String>>;

    /// Read a whole hash. Empty if missing.
    async fn hgetall(&self, key: &str) -> AppResult<HashMap<String, String>>;

    /// Write several hash fields at once.
    ///
    /// `ttl` applies only when the write creates the hash; an existing hash
    /// keeps its expiry.
    async fn hset_many(&self, key: &str, fields: &[(String, String)], ttl: Duration)
    -> AppResult<()>;

    /// Remove hash fields.
    async fn hdel(&self, key: &str, fields: &[String]) -> AppResult<()>;

    /// Add a set member and refresh the set TTL. Returns `true` if newly added.
    async fn sadd(&self, key: &str, member: &str, ttl: Duration) -> AppResult<bool>;

    /// Remove a set member. Returns `true` if it was present.
    async fn srem(&self, key: &str, member: &str) -> AppResult<bool>;

    /// All members of a set, in no particular order.
    async fn smembers(&self, key: &str) -> AppResult<Vec<String>>;

    /// Whether `member` belongs to the set.
    async fn sismember(&self, key: &str, member: &str) -> AppResult<bool>;

    /// Number of members in a set.
    async fn scard(&self, key: &str) -> AppResult<u64>;

    /// Add a member to a sorted set only if absent, refreshing the TTL.
    /// Returns `true` if newly added.
    async fn zadd_nx(&self, key: &str, member: &str, score: f64, ttl: Duration)
    -> AppResult<bool>;

    /// All members of a sorted set, ascending by score.
    async fn zrange_all(&self, key: &str) -> AppResult<Vec<String>>;

    /// Number of members in a sorted set.
    async fn zcard(&self, key: &str) -> AppResult<u64>;

    /// Publish a payload on a channel. Delivery is best effort.
    async fn publish(&self, channel: &str, payload: &str) -> AppResult<()>;

    /// Subscribe to a channel. Messages published before the call are not seen.
    async fn subscribe(&self, channel: &str) -> AppResult<MessageStream>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
