//! In-memory collaborators for tests and single-process demos.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use bingo_core::AppError;
use bingo_core::result::AppResult;
use bingo_core::traits::store::{MessageStream, StateStore};
use bingo_core::traits::{ClaimRepository, PaymentGateway, PayoutGateway, RoomRepository};
use bingo_core::types::{ClaimRecord, GameId, GameRecord, PlayerId, RoomConfig, RoomId};

use crate::context::Collaborators;

/// Payment gateway recording charges in memory.
#[derive(Debug, Default)]
pub struct MemoryPaymentGateway {
    charges: Mutex<HashMap<(PlayerId, GameId), u64>>,
    declined: Mutex<HashSet<PlayerId>>,
    failing: Mutex<HashSet<PlayerId>>,
    paused: Mutex<HashMap<PlayerId, Arc<Notify>>>,
    charge_calls: Mutex<u32>,
    refund_calls: Mutex<u32>,
}

impl MemoryPaymentGateway {
    /// Hold every charge of `player_id` until the returned handle is
    /// notified once per held charge.
    pub async fn pause(&self, player_id: PlayerId) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.paused.lock().await.insert(player_id, gate.clone());
        gate
    }

    /// Decline every charge of `player_id`.
    pub async fn decline(&self, player_id: PlayerId) {
        self.declined.lock().await.insert(player_id);
    }

    /// Fail every charge of `player_id` with an error.
    pub async fn fail(&self, player_id: PlayerId) {
        self.failing.lock().await.insert(player_id);
    }

    /// Amount currently held for a player in a game.
    pub async fn charged(&self, player_id: PlayerId, game_id: GameId) -> Option<u64> {
        self.charges.lock().await.get(&(player_id, game_id)).copied()
    }

    /// Number of charge calls.
    pub async fn charge_calls(&self) -> u32 {
        *self.charge_calls.lock().await
    }

    /// Number of refund calls.
    pub async fn refund_calls(&self) -> u32 {
        *self.refund_calls.lock().await
    }
}

#[async_trait]
impl PaymentGateway for MemoryPaymentGateway {
    async fn charge(&self, player_id: PlayerId, amount: u64, game_id: GameId) -> AppResult<bool> {
        *self.charge_calls.lock().await += 1;
        let gate = self.paused.lock().await.get(&player_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing.lock().await.contains(&player_id) {
            return Err(AppError::external_service("payment provider unavailable"));
        }
        if self.declined.lock().await.contains(&player_id) {
            return Ok(false);
        }
        self.charges.lock().await.insert((player_id, game_id), amount);
        Ok(true)
    }

    async fn refund(&self, player_id: PlayerId, game_id: GameId) -> AppResult<bool> {
        *self.refund_calls.lock().await += 1;
        Ok(self.charges.lock().await.remove(&(player_id, game_id)).is_some())
    }
}

/// Payout gateway recording payouts in memory.
///
/// Like the wallet adapter, a game is paid at most once.
#[derive(Debug, Default)]
pub struct MemoryPayoutGateway {
    payouts: Mutex<Vec<(GameId, PlayerId, u64)>>,
    failures_left: Mutex<u32>,
    payout_calls: Mutex<u32>,
}

impl MemoryPayoutGateway {
    /// Every payout made, in order.
    pub async fn payouts(&self) -> Vec<(GameId, PlayerId, u64)> {
        self.payouts.lock().await.clone()
    }

    /// Fail the next `times` payout calls with an unavailable provider.
    pub async fn fail_next(&self, times: u32) {
        *self.failures_left.lock().await = times;
    }

    /// Number of payout calls, failed ones included.
    pub async fn payout_calls(&self) -> u32 {
        *self.payout_calls.lock().await
    }
}

#[async_trait]
impl PayoutGateway for MemoryPayoutGateway {
    async fn payout(&self, game_id: GameId, winner_id: PlayerId, amount: u64) -> AppResult<()> {
        *self.payout_calls.lock().await += 1;
        {
            let mut failures_left = self.failures_left.lock().await;
            if *failures_left > 0 {
                *failures_left -= 1;
                return Err(AppError::service_unavailable("payout provider unavailable"));
            }
        }
        let mut payouts = self.payouts.lock().await;
        if !payouts.iter().any(|(paid, _, _)| *paid == game_id) {
            payouts.push((game_id, winner_id, amount));
        }
        Ok(())
    }
}

/// Room repository backed by maps.
#[derive(Debug, Default)]
pub struct MemoryRoomRepository {
    rooms: Mutex<HashMap<RoomId, RoomConfig>>,
    games: Mutex<HashMap<GameId, GameRecord>>,
}

impl MemoryRoomRepository {
    /// Add or replace a room.
    pub async fn insert_room(&self, room: RoomConfig) {
        self.rooms.lock().await.insert(room.room_id, room);
    }

    /// Latest summary written for a game.
    pub async fn game(&self, game_id: GameId) -> Option<GameRecord> {
        self.games.lock().await.get(&game_id).cloned()
    }
}

#[async_trait]
impl RoomRepository for MemoryRoomRepository {
    async fn find_room(&self, room_id: RoomId) -> AppResult<Option<RoomConfig>> {
        Ok(self.rooms.lock().await.get(&room_id).cloned())
    }

    async fn upsert_game(&self, record: &GameRecord) -> AppResult<()> {
        self.games.lock().await.insert(record.game_id, record.clone());
        Ok(())
    }
}

/// Claim log backed by a vector.
#[derive(Debug, Default)]
pub struct MemoryClaimRepository {
    claims: Mutex<Vec<ClaimRecord>>,
}

impl MemoryClaimRepository {
    /// Every recorded claim, in order.
    pub async fn claims(&self) -> Vec<ClaimRecord> {
        self.claims.lock().await.clone()
    }
}

#[async_trait]
impl ClaimRepository for MemoryClaimRepository {
    async fn record(&self, claim: &ClaimRecord) -> AppResult<()> {
        self.claims.lock().await.push(claim.clone());
        Ok(())
    }
}

/// Typed handles to the in-memory collaborators.
#[derive(Debug, Clone, Default)]
pub struct MemoryCollaborators {
    pub rooms: Arc<MemoryRoomRepository>,
    pub claims: Arc<MemoryClaimRepository>,
    pub payments: Arc<MemoryPaymentGateway>,
    pub payouts: Arc<MemoryPayoutGateway>,
}

impl MemoryCollaborators {
    /// Type-erased view for the engine.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            rooms: self.rooms.clone(),
            claims: self.claims.clone(),
            payments: self.payments.clone(),
            payouts: self.payouts.clone(),
        }
    }
}

/// State store wrapper that fails chosen operations on matching keys.
///
/// Used to drive compensation paths that a healthy store never takes.
#[derive(Debug, Clone)]
pub struct FaultyStateStore {
    inner: Arc<dyn StateStore>,
    faults: Arc<Mutex<Vec<Fault>>>,
}

#[derive(Debug)]
struct Fault {
    operation: &'static str,
    key_fragment: String,
    remaining: u32,
}

impl FaultyStateStore {
    /// Wrap `inner`; every operation passes through until a fault is armed.
    pub fn new(inner: Arc<dyn StateStore>) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail the next `times` calls of `operation` (the trait method name)
    /// on keys containing `key_fragment`.
    pub async fn fail(&self, operation: &'static str, key_fragment: impl Into<String>, times: u32) {
        self.faults.lock().await.push(Fault {
            operation,
            key_fragment: key_fragment.into(),
            remaining: times,
        });
    }

    async fn check(&self, operation: &'static str, key: &str) -> AppResult<()> {
        let mut faults = self.faults.lock().await;
        let hit = faults.iter_mut().find(|f| {
            f.remaining > 0 && f.operation == operation && key.contains(&f.key_fragment)
        });
        match hit {
            Some(fault) => {
                fault.remaining -= 1;
                Err(AppError::cache(format!("injected {operation} failure on '{key}'")))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StateStore for FaultyStateStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.check("get", key).await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.check("set", key).await?;
        self.inner.set(key, value, ttl).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        self.check("set_nx", key).await?;
        self.inner.set_nx(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        self.check("delete", key).await?;
        self.inner.delete(key).await
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> AppResult<bool> {
        self.check("delete_if_eq", key).await?;
        self.inner.delete_if_eq(key, expected).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        self.check("expire", key).await?;
        self.inner.expire(key, ttl).await
    }

    async fn expire_if_eq(&self, key: &str, expected: &str, ttl: Duration) -> AppResult<bool> {
        self.check("expire_if_eq", key).await?;
        self.inner.expire_if_eq(key, expected, ttl).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.check("exists", key).await?;
        self.inner.exists(key).await
    }

    async fn hget(&self, key: &str, field: &str) -> AppResult<Option<String>> {
        self.check("hget", key).await?;
        self.inner.hget(key, field).await
    }

    async fn hgetall(&self, key: &str) -> AppResult<HashMap<String, String>> {
        self.check("hgetall", key).await?;
        self.inner.hgetall(key).await
    }

    async fn hset_many(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> AppResult<()> {
        self.check("hset_many", key).await?;
        self.inner.hset_many(key, fields, ttl).await
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> AppResult<()> {
        self.check("hdel", key).await?;
        self.inner.hdel(key, fields).await
    }

    async fn sadd(&self, key: &str, member: &str, ttl: Duration) -> AppResult<bool> {
        self.check("sadd", key).await?;
        self.inner.sadd(key, member, ttl).await
    }

    async fn srem(&self, key: &str, member: &str) -> AppResult<bool> {
        self.check("srem", key).await?;
        self.inner.srem(key, member).await
    }

    async fn smembers(&self, key: &str) -> AppResult<Vec<String>> {
        self.check("smembers", key).await?;
        self.inner.smembers(key).await
    }

    async fn sismember(&self, key: &str, member: &str) -> AppResult<bool> {
        self.check("sismember", key).await?;
        self.inner.sismember(key, member).await
    }

    async fn scard(&self, key: &str) -> AppResult<u64> {
        self.check("scard", key).await?;
        self.inner.scard(key).await
    }

    async fn zadd_nx(&self, key: &str, member: &str, score: f64, ttl: Duration) -> AppResult<bool> {
        self.check("zadd_nx", key).await?;
        self.inner.zadd_nx(key, member, score, ttl).await
    }

    async fn zrange_all(&self, key: &str) -> AppResult<Vec<String>> {
        self.check("zrange_all", key).await?;
        self.inner.zrange_all(key).await
    }

    async fn zcard(&self, key: &str) -> AppResult<u64> {
        self.check("zcard", key).await?;
        self.inner.zcard(key).await
    }

    async fn publish(&self, channel: &str, payload: &str) -> AppResult<()> {
        self.check("publish", channel).await?;
        self.inner.publish(channel, payload).await
    }

    async fn subscribe(&self, channel: &str) -> AppResult<MessageStream> {
        self.check("subscribe", channel).await?;
        self.inner.subscribe(channel).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
