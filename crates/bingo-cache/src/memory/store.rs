//! In-memory state store built on dashmap.
//!
//! Every key lives in one [`DashMap`] shard entry, so each operation on a
//! single key is atomic: the shard lock is held for the whole
//! read-modify-write. Expiry uses [`tokio::time::Instant`] and is applied
//! lazily; an expired entry is invisible to every read and is replaced by
//! the next write. Pub/sub is a [`broadcast`] channel per channel name.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use bingo_core::config::cache::MemoryCacheConfig;
use bingo_core::error::AppError;
use bingo_core::result::AppResult;
use bingo_core::traits::store::{MessageStream, StateStore};

/// A stored value of one of the supported types.
#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    /// Kept sorted by `(score, member)`.
    SortedSet(Vec<(f64, String)>),
}

impl Value {
    fn is_empty(&self) -> bool {
        match self {
            Self::Str(_) => false,
            Self::Hash(h) => h.is_empty(),
            Self::Set(s) => s.is_empty(),
            Self::SortedSet(z) => z.is_empty(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Working copy of one key during an update.
struct Slot {
    /// Live value, `None` if absent or expired. Set to `None` to delete.
    value: Option<Value>,
    /// New TTL to apply; `None` keeps the current expiry.
    refresh: Option<Duration>,
}

/// In-memory state store.
#[derive(Debug, Clone)]
pub struct MemoryStateStore {
    entries: Arc<DashMap<String, Entry>>,
    channels: Arc<DashMap<String, broadcast::Sender<String>>>,
    buffer_size: usize,
}

impl MemoryStateStore {
    /// Create a new in-memory store from configuration.
    pub fn new(config: &MemoryCacheConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            channels: Arc::new(DashMap::new()),
            buffer_size: config.channel_buffer_size.max(1),
        }
    }

    /// Run `f` against the live value of `key`, if any.
    fn read<R>(&self, key: &str, f: impl FnOnce(&Value) -> AppResult<R>) -> AppResult<Option<R>> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => f(&entry.value).map(Some),
            _ => Ok(None),
        }
    }

    /// Atomic read-modify-write of one key.
    ///
    /// Nothing is written when `f` fails. Empty collections are removed.
    fn update<R>(&self, key: &str, f: impl FnOnce(&mut Slot) -> AppResult<R>) -> AppResult<R> {
        let now = Instant::now();
        let entry = self.entries.entry(key.to_string());
        let (value, previous_expiry) = match &entry {
            MapEntry::Occupied(o) if o.get().expires_at > now => {
                (Some(o.get().value.clone()), Some(o.get().expires_at))
            }
            _ => (None, None),
        };
        let mut slot = Slot {
            value,
            refresh: None,
        };
        let result = f(&mut slot)?;

        let expires_at = slot.refresh.map(|ttl| now + ttl).or(previous_expiry);
        match (slot.value.filter(|v| !v.is_empty()), expires_at) {
            (Some(value), Some(expires_at)) => {
                entry.insert(Entry { value, expires_at });
            }
            _ => {
                if let MapEntry::Occupied(o) = entry {
                    o.remove();
                }
            }
        }
        Ok(result)
    }
}

fn wrong_type(key: &str) -> AppError {
    AppError::cache(format!("WRONGTYPE operation against key '{key}'"))
}

fn hash_mut<'a>(slot: &'a mut Slot, key: &str) -> AppResult<&'a mut HashMap<String, String>> {
    match slot.value.get_or_insert_with(|| Value::Hash(HashMap::new())) {
        Value::Hash(h) => Ok(h),
        _ => Err(wrong_type(key)),
    }
}

fn set_mut<'a>(slot: &'a mut Slot, key: &str) -> AppResult<&'a mut HashSet<String>> {
    match slot.value.get_or_insert_with(|| Value::Set(HashSet::new())) {
        Value::Set(s) => Ok(s),
        _ => Err(wrong_type(key)),
    }
}

fn zset_mut<'a>(slot: &'a mut Slot, key: &str) -> AppResult<&'a mut Vec<(f64, String)>> {
    match slot.value.get_or_insert_with(|| Value::SortedSet(Vec::new())) {
        Value::SortedSet(z) => Ok(z),
        _ => Err(wrong_type(key)),
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.read(key, |v| match v {
            Value::Str(s) => Ok(s.clone()),
            _ => Err(wrong_type(key)),
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.update(key, |slot| {
            slot.value = Some(Value::Str(value.to_string()));
            slot.refresh = Some(ttl);
            Ok(())
        })
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        self.update(key, |slot| {
            if slot.value.is_some() {
                return Ok(false);
            }
            slot.value = Some(Value::Str(value.to_string()));
            slot.refresh = Some(ttl);
            Ok(true)
        })
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        self.update(key, |slot| Ok(slot.value.take().is_some()))
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> AppResult<bool> {
        self.update(key, |slot| {
            let matches = matches!(&slot.value, Some(Value::Str(s)) if s == expected);
            if matches {
                slot.value = None;
            }
            Ok(matches)
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        self.update(key, |slot| {
            let exists = slot.value.is_some();
            if exists {
                slot.refresh = Some(ttl);
            }
            Ok(exists)
        })
    }

    async fn expire_if_eq(&self, key: &str, expected: &str, ttl: Duration) -> AppResult<bool> {
        self.update(key, |slot| {
            let matches = matches!(&slot.value, Some(Value::Str(s)) if s == expected);
            if matches {
                slot.refresh = Some(ttl);
            }
            Ok(matches)
        })
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.read(key, |_| Ok(()))?.is_some())
    }

    async fn hget(&self, key: &str, field: &str) -> AppResult<Option<String>> {
        let value = self.read(key, |v| match v {
            Value::Hash(h) => Ok(h.get(field).cloned()),
            _ => Err(wrong_type(key)),
        })?;
        Ok(value.flatten())
    }

    async fn hgetall(&self, key: &str) -> AppResult<HashMap<String, String>> {
        let value = self.read(key, |v| match v {
            Value::Hash(h) => Ok(h.clone()),
            _ => Err(wrong_type(key)),
        })?;
        Ok(value.unwrap_or_default())
    }

    async fn hset_many(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> AppResult<()> {
        self.update(key, |slot| {
            let created = slot.value.is_none();
            let hash = hash_mut(slot, key)?;
            for (field, value) in fields {
                hash.insert(field.clone(), value.clone());
            }
            if created {
                slot.refresh = Some(ttl);
            }
            Ok(())
        })
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> AppResult<()> {
        self.update(key, |slot| {
            if slot.value.is_none() {
                return Ok(());
            }
            let hash = hash_mut(slot, key)?;
            for field in fields {
                hash.remove(field);
            }
            Ok(())
        })
    }

    async fn sadd(&self, key: &str, member: &str, ttl: Duration) -> AppResult<bool> {
        self.update(key, |slot| {
            let added = set_mut(slot, key)?.insert(member.to_string());
            slot.refresh = Some(ttl);
            Ok(added)
        })
    }

    async fn srem(&self, key: &str, member: &str) -> AppResult<bool> {
        self.update(key, |slot| {
            if slot.value.is_none() {
                return Ok(false);
            }
            Ok(set_mut(slot, key)?.remove(member))
        })
    }

    async fn smembers(&self, key: &str) -> AppResult<Vec<String>> {
        let members = self.read(key, |v| match v {
            Value::Set(s) => Ok(s.iter().cloned().collect()),
            _ => Err(wrong_type(key)),
        })?;
        Ok(members.unwrap_or_default())
    }

    async fn sismember(&self, key: &str, member: &str) -> AppResult<bool> {
        let found = self.read(key, |v| match v {
            Value::Set(s) => Ok(s.contains(member)),
            _ => Err(wrong_type(key)),
        })?;
        Ok(found.unwrap_or(false))
    }

    async fn scard(&self, key: &str) -> AppResult<u64> {
        let count = self.read(key, |v| match v {
            Value::Set(s) => Ok(s.len() as u64),
            _ => Err(wrong_type(key)),
        })?;
        Ok(count.unwrap_or(0))
    }

    async fn zadd_nx(&self, key: &str, member: &str, score: f64, ttl: Duration) -> AppResult<bool> {
        self.update(key, |slot| {
            let zset = zset_mut(slot, key)?;
            let added = if zset.iter().any(|(_, m)| m == member) {
                false
            } else {
                let at = zset
                    .partition_point(|(s, m)| *s < score || (*s == score && m.as_str() < member));
                zset.insert(at, (score, member.to_string()));
                true
            };
            slot.refresh = Some(ttl);
            Ok(added)
        })
    }

    async fn zrange_all(&self, key: &str) -> AppResult<Vec<String>> {
        let members = self.read(key, |v| match v {
            Value::SortedSet(z) => Ok(z.iter().map(|(_, m)| m.clone()).collect()),
            _ => Err(wrong_type(key)),
        })?;
        Ok(members.unwrap_or_default())
    }

    async fn zcard(&self, key: &str) -> AppResult<u64> {
        let count = self.read(key, |v| match v {
            Value::SortedSet(z) => Ok(z.len() as u64),
            _ => Err(wrong_type(key)),
        })?;
        Ok(count.unwrap_or(0))
    }

    async fn publish(&self, channel: &str, payload: &str) -> AppResult<()> {
        if let Some(tx) = self.channels.get(channel) {
            let receivers = tx.send(payload.to_string()).unwrap_or(0);
            debug!(channel, receivers, "Published message");
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> AppResult<MessageStream> {
        let rx = self
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .subscribe();

        let stream = futures::stream::unfold((rx, channel.to_string()), |(mut rx, channel)| async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => return Some((payload, (rx, channel))),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel = %channel, skipped, "Subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(stream.boxed())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn make_store() -> MemoryStateStore {
        MemoryStateStore::new(&MemoryCacheConfig::default())
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = make_store();
        store.set("k", "v", TTL).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = make_store();
        store.set("k", "v", Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_millis(1_001)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
        assert!(store.set_nx("k", "w", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_nx_and_compare_and_delete() {
        let store = make_store();
        assert!(store.set_nx("lock", "a", TTL).await.unwrap());
        assert!(!store.set_nx("lock", "b", TTL).await.unwrap());
        assert!(!store.delete_if_eq("lock", "b").await.unwrap());
        assert!(store.exists("lock").await.unwrap());
        assert!(store.delete_if_eq("lock", "a").await.unwrap());
        assert!(!store.exists("lock").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_if_eq_extends_only_for_owner() {
        let store = make_store();
        store.set("lock", "a", Duration::from_secs(2)).await.unwrap();
        assert!(!store.expire_if_eq("lock", "b", TTL).await.unwrap());
        assert!(store.expire_if_eq("lock", "a", Duration::from_secs(10)).await.unwrap());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.get("lock").await.unwrap(), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_hash_ops() {
        let store = make_store();
        let fields = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ];
        store.hset_many("h", &fields, TTL).await.unwrap();
        assert_eq!(store.hget("h", "a").await.unwrap(), Some("1".to_string()));
        store.hdel("h", &["a".to_string()]).await.unwrap();
        let all = store.hgetall("h").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("b").map(String::as_str), Some("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hash_writes_keep_expiry() {
        let store = make_store();
        let field = vec![("a".to_string(), "1".to_string())];
        store.hset_many("h", &field, Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        let field = vec![("a".to_string(), "2".to_string())];
        store.hset_many("h", &field, Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.hget("h", "a").await.unwrap(), Some("2".to_string()));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!store.exists("h").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_ops() {
        let store = make_store();
        assert!(store.sadd("s", "x", TTL).await.unwrap());
        assert!(!store.sadd("s", "x", TTL).await.unwrap());
        assert!(store.sadd("s", "y", TTL).await.unwrap());
        assert_eq!(store.scard("s").await.unwrap(), 2);
        assert!(store.sismember("s", "y").await.unwrap());
        assert!(store.srem("s", "x").await.unwrap());
        assert!(store.srem("s", "y").await.unwrap());
        assert!(!store.exists("s").await.unwrap());
    }

    #[tokio::test]
    async fn test_sorted_set_keeps_score_order_and_uniqueness() {
        let store = make_store();
        assert!(store.zadd_nx("z", "42", 2.0, TTL).await.unwrap());
        assert!(store.zadd_nx("z", "7", 1.0, TTL).await.unwrap());
        assert!(!store.zadd_nx("z", "42", 3.0, TTL).await.unwrap());
        assert_eq!(store.zrange_all("z").await.unwrap(), vec!["7", "42"]);
        assert_eq!(store.zcard("z").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let store = make_store();
        store.set("k", "v", TTL).await.unwrap();
        assert!(store.sadd("k", "x", TTL).await.is_err());
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_pubsub_delivers_to_subscribers() {
        let store = make_store();
        let mut first = store.subscribe("room").await.unwrap();
        let mut second = store.subscribe("room").await.unwrap();
        store.publish("room", "hello").await.unwrap();
        assert_eq!(first.next().await, Some("hello".to_string()));
        assert_eq!(second.next().await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let store = make_store();
        store.publish("nobody", "hello").await.unwrap();
    }
}
