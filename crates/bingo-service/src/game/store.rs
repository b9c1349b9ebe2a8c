//! Persistence of a room's current `GameState`.
//!
//! Scalar fields live in one hash per room, each field holding its JSON
//! encoding. Collection fields that several writers grow concurrently live
//! in their own sets and only change through atomic set operations:
//!
//! - `joinedPlayers` in the joined-players set
//! - `selectedCardIds` in the selected-cards set
//! - `drawnNumbers` in the drawn-numbers sorted set, scored by sequence
//!
//! Hash rewrites happen under the per-game state lock.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use bingo_cache::LockToken;
use bingo_cache::keys;
use bingo_core::result::AppResult;
use bingo_core::types::{GameId, GameState, PlayerId, RoomId};

use crate::context::EngineContext;
use crate::error::GameError;

/// Hash fields rebuilt from their own sets on load.
const SET_FIELDS: [&str; 3] = ["joinedPlayers", "selectedCardIds", "drawnNumbers"];

/// Reads and writes game state in the shared store.
#[derive(Debug, Clone)]
pub struct GameStore {
    ctx: EngineContext,
}

impl GameStore {
    /// Create a game store.
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Load the current game of a room. `None` if the room has no game.
    pub async fn load(&self, room_id: RoomId) -> AppResult<Option<GameState>> {
        let fields = self.ctx.store.hgetall(&keys::game_state(room_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode(&self.ctx, fields).await.map(Some)
    }

    /// Persist a freshly created game and mark its room active.
    ///
    /// The hash expiry is set here only, so the state TTL is an absolute
    /// backstop counted from creation.
    pub async fn create(&self, state: &GameState) -> AppResult<()> {
        let ttl = self.ctx.config.state_ttl();
        let key = keys::game_state(state.room_id);
        self.ctx.store.hset_many(&key, &encode(state)?, ttl).await?;
        // A replaced game leaves its hash behind; restart the clock.
        self.ctx.store.expire(&key, ttl).await?;
        self.ctx
            .store
            .sadd(&keys::active_rooms(), &state.room_id.to_string(), ttl)
            .await?;
        info!(room_id = %state.room_id, game_id = %state.game_id, "Game created");
        Ok(())
    }

    /// Rewrite the scalar fields and refresh `statusUpdatedAt`. The hash
    /// keeps the expiry set by `create`.
    ///
    /// Callers must hold the state lock of the game.
    pub async fn save(&self, state: &mut GameState) -> AppResult<()> {
        state.status_updated_at = Utc::now();
        self.ctx
            .store
            .hset_many(
                &keys::game_state(state.room_id),
                &encode(state)?,
                self.ctx.config.state_ttl(),
            )
            .await
    }

    /// Take the state lock of a game, retrying while it is busy.
    pub async fn lock_state(&self, game_id: GameId) -> Result<LockToken, GameError> {
        let token = LockToken::new();
        let acquired = self
            .ctx
            .locks
            .acquire_with_retry(
                &keys::locks::state(game_id),
                &token,
                self.ctx.config.locks.state_ttl(),
                &self.ctx.retry,
            )
            .await?;
        if acquired {
            Ok(token)
        } else {
            Err(GameError::LockBusy)
        }
    }

    /// Release the state lock of a game.
    pub async fn unlock_state(&self, game_id: GameId, token: &LockToken) {
        self.ctx
            .locks
            .release_quietly(&keys::locks::state(game_id), token)
            .await;
    }

    /// Read-modify-write the game under its state lock.
    ///
    /// Fails with `GAME_NOT_FOUND` when the room's game was replaced. When
    /// `f` rejects, nothing is written.
    pub async fn update<T, F>(
        &self,
        room_id: RoomId,
        game_id: GameId,
        f: F,
    ) -> Result<(GameState, T), GameError>
    where
        F: FnOnce(&mut GameState) -> Result<T, GameError>,
    {
        let token = self.lock_state(game_id).await?;
        let result = self.update_locked(room_id, game_id, f).await;
        self.unlock_state(game_id, &token).await;
        result
    }

    async fn update_locked<T, F>(
        &self,
        room_id: RoomId,
        game_id: GameId,
        f: F,
    ) -> Result<(GameState, T), GameError>
    where
        F: FnOnce(&mut GameState) -> Result<T, GameError>,
    {
        let mut state = match self.load(room_id).await? {
            Some(state) if state.game_id == game_id => state,
            _ => return Err(GameError::GameNotFound),
        };
        let value = f(&mut state)?;
        self.save(&mut state).await?;
        Ok((state, value))
    }

    /// Add a player to the joined set. `false` if already present.
    pub async fn add_player(&self, game_id: GameId, player_id: PlayerId) -> AppResult<bool> {
        self.ctx
            .store
            .sadd(
                &keys::joined_players(game_id),
                &player_id.to_string(),
                self.ctx.config.state_ttl(),
            )
            .await
    }

    /// Remove a player from the joined set. `false` if absent.
    pub async fn remove_player(&self, game_id: GameId, player_id: PlayerId) -> AppResult<bool> {
        self.ctx
            .store
            .srem(&keys::joined_players(game_id), &player_id.to_string())
            .await
    }

    /// Reserve a seat while the player's entry fee is charged. `false` if
    /// the player already holds one.
    pub async fn add_pending(&self, game_id: GameId, player_id: PlayerId) -> AppResult<bool> {
        self.ctx
            .store
            .sadd(
                &keys::pending_players(game_id),
                &player_id.to_string(),
                self.ctx.config.state_ttl(),
            )
            .await
    }

    /// Drop a pending seat. `false` if absent.
    pub async fn remove_pending(&self, game_id: GameId, player_id: PlayerId) -> AppResult<bool> {
        self.ctx
            .store
            .srem(&keys::pending_players(game_id), &player_id.to_string())
            .await
    }

    /// Whether the player holds a pending seat.
    pub async fn is_pending(&self, game_id: GameId, player_id: PlayerId) -> AppResult<bool> {
        self.ctx
            .store
            .sismember(&keys::pending_players(game_id), &player_id.to_string())
            .await
    }

    /// Seats reserved by joins whose charge is in flight.
    pub async fn pending_count(&self, game_id: GameId) -> AppResult<u32> {
        let count = self
            .ctx
            .store
            .scard(&keys::pending_players(game_id))
            .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Append a drawn number. `false` if it was already drawn.
    pub async fn record_draw(&self, game_id: GameId, number: u8, sequence: u32) -> AppResult<bool> {
        self.ctx
            .store
            .zadd_nx(
                &keys::drawn_numbers(game_id),
                &number.to_string(),
                f64::from(sequence),
                self.ctx.config.state_ttl(),
            )
            .await
    }

    /// Rooms that currently have a game.
    pub async fn active_rooms(&self) -> AppResult<Vec<RoomId>> {
        let members = self.ctx.store.smembers(&keys::active_rooms()).await?;
        Ok(members.iter().filter_map(|m| m.parse().ok()).collect())
    }

    /// Drop a room from the active set once its hash is gone.
    pub async fn forget_room(&self, room_id: RoomId) -> AppResult<bool> {
        if self.ctx.store.exists(&keys::game_state(room_id)).await? {
            return Ok(false);
        }
        self.ctx
            .store
            .srem(&keys::active_rooms(), &room_id.to_string())
            .await
    }

    /// Delete every key the game owns.
    ///
    /// The room's hash is removed only while it still describes this game,
    /// checked under the room's init lock so a replacement is never touched.
    pub async fn purge(&self, state: &GameState) -> AppResult<()> {
        let store = &self.ctx.store;
        let game_id = state.game_id;

        let mut players = state.joined_players.clone();
        for card_id in &state.all_card_ids {
            let owner_key = keys::card_owner(game_id, *card_id);
            if let Some(owner) = store.get(&owner_key).await? {
                if let Ok(owner) = owner.parse::<PlayerId>() {
                    players.insert(owner);
                }
                store.delete(&owner_key).await?;
            }
        }
        for player_id in players {
            let cards_key = keys::player_cards(game_id, player_id);
            for card in store.smembers(&cards_key).await? {
                if let Ok(card_id) = card.parse() {
                    store
                        .delete(&keys::marked_numbers(game_id, player_id, card_id))
                        .await?;
                }
            }
            store.delete(&cards_key).await?;
        }
        for key in [
            keys::drawn_numbers(game_id),
            keys::joined_players(game_id),
            keys::pending_players(game_id),
            keys::selected_cards(game_id),
            keys::card_pool(game_id),
        ] {
            store.delete(&key).await?;
        }

        let init_key = keys::locks::init(state.room_id);
        let token = LockToken::new();
        if !self
            .ctx
            .locks
            .acquire_with_retry(&init_key, &token, self.ctx.config.locks.init_ttl(), &self.ctx.retry)
            .await?
        {
            warn!(game_id = %game_id, "Init lock busy, leaving game hash to expire");
            return Ok(());
        }
        let result = self.remove_hash_if_current(state).await;
        self.ctx.locks.release_quietly(&init_key, &token).await;
        result?;

        info!(room_id = %state.room_id, game_id = %game_id, "Game purged");
        Ok(())
    }

    async fn remove_hash_if_current(&self, state: &GameState) -> AppResult<()> {
        let state_key = keys::game_state(state.room_id);
        let current = self.ctx.store.hget(&state_key, "gameId").await?;
        if current.as_deref() != Some(serde_json::to_string(&state.game_id)?.as_str()) {
            debug!(game_id = %state.game_id, "Room already hosts another game");
            return Ok(());
        }
        self.ctx.store.delete(&state_key).await?;
        self.ctx
            .store
            .srem(&keys::active_rooms(), &state.room_id.to_string())
            .await?;
        Ok(())
    }
}

/// Scalar hash fields of `state`, each JSON-encoded.
fn encode(state: &GameState) -> AppResult<Vec<(String, String)>> {
    let Value::Object(map) = serde_json::to_value(state)? else {
        return Ok(Vec::new());
    };
    Ok(map
        .into_iter()
        .filter(|(field, _)| !SET_FIELDS.contains(&field.as_str()))
        .map(|(field, value)| (field, value.to_string()))
        .collect())
}

async fn decode(ctx: &EngineContext, fields: HashMap<String, String>) -> AppResult<GameState> {
    let mut map = Map::with_capacity(fields.len() + SET_FIELDS.len());
    for (field, raw) in fields {
        map.insert(field, serde_json::from_str(&raw)?);
    }
    for field in SET_FIELDS {
        map.insert(field.to_string(), Value::Array(Vec::new()));
    }
    let mut state: GameState = serde_json::from_value(Value::Object(map))?;

    let game_id = state.game_id;
    let store = &ctx.store;
    state.joined_players = store
        .smembers(&keys::joined_players(game_id))
        .await?
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    state.selected_card_ids = store
        .smembers(&keys::selected_cards(game_id))
        .await?
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    state.drawn_numbers = store
        .zrange_all(&keys::drawn_numbers(game_id))
        .await?
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use bingo_cache::memory::MemoryStateStore;
    use bingo_core::config::GameConfig;
    use bingo_core::config::cache::MemoryCacheConfig;
    use bingo_core::types::{CardId, GameStatus, RoomConfig};

    fn setup() -> (GameStore, GameState) {
        let store = Arc::new(MemoryStateStore::new(&MemoryCacheConfig::default()));
        let ctx = EngineContext::new(GameConfig::default(), store);
        let room = RoomConfig {
            room_id: RoomId::new(),
            name: "Test".to_string(),
            min_players: 2,
            capacity: 10,
            entry_fee: 10,
            commission_rate: 0.1,
        };
        let state = GameState::new(GameId::new(), &room, 10, Utc::now());
        (GameStore::new(ctx), state)
    }

    #[tokio::test]
    async fn test_create_then_load() {
        let (games, state) = setup();
        games.create(&state).await.unwrap();
        let loaded = games.load(state.room_id).await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(games.active_rooms().await.unwrap(), vec![state.room_id]);
    }

    #[tokio::test]
    async fn test_sets_are_rebuilt_on_load() {
        let (games, state) = setup();
        games.create(&state).await.unwrap();
        let alice = PlayerId::new();
        assert!(games.add_player(state.game_id, alice).await.unwrap());
        assert!(!games.add_player(state.game_id, alice).await.unwrap());
        assert!(games.record_draw(state.game_id, 42, 1).await.unwrap());
        assert!(games.record_draw(state.game_id, 7, 2).await.unwrap());
        assert!(!games.record_draw(state.game_id, 42, 3).await.unwrap());

        let loaded = games.load(state.room_id).await.unwrap().unwrap();
        assert!(loaded.is_member(&alice));
        assert_eq!(loaded.drawn_numbers, vec![42, 7]);
    }

    #[tokio::test]
    async fn test_update_applies_and_saves() {
        let (games, state) = setup();
        games.create(&state).await.unwrap();
        let (updated, previous) = games
            .update(state.room_id, state.game_id, |s| {
                let previous = s.status;
                s.status = GameStatus::Countdown;
                Ok(previous)
            })
            .await
            .unwrap();
        assert_eq!(previous, GameStatus::Ready);
        assert_eq!(updated.status, GameStatus::Countdown);
        let loaded = games.load(state.room_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, GameStatus::Countdown);
    }

    #[tokio::test]
    async fn test_rejected_update_writes_nothing() {
        let (games, state) = setup();
        games.create(&state).await.unwrap();
        let err = games
            .update(state.room_id, state.game_id, |s| -> Result<(), GameError> {
                s.status = GameStatus::Playing;
                Err(GameError::GameFull)
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "GAME_FULL");
        let loaded = games.load(state.room_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, GameStatus::Ready);
    }

    #[tokio::test]
    async fn test_update_of_replaced_game() {
        let (games, state) = setup();
        games.create(&state).await.unwrap();
        let err = games
            .update(state.room_id, GameId::new(), |_| Ok(()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "GAME_NOT_FOUND");
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_when_state_lock_is_held() {
        let (games, state) = setup();
        games.create(&state).await.unwrap();
        let _held = games.lock_state(state.game_id).await.unwrap();
        let err = games
            .update(state.room_id, state.game_id, |_| Ok(()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "LOCK_BUSY");
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_does_not_extend_expiry() {
        let (games, state) = setup();
        let ttl = games.ctx.config.state_ttl();
        games.create(&state).await.unwrap();

        tokio::time::advance(ttl - Duration::from_secs(60)).await;
        games
            .update(state.room_id, state.game_id, |s| {
                s.status = GameStatus::Countdown;
                Ok(())
            })
            .await
            .unwrap();
        assert!(games.load(state.room_id).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(games.load(state.room_id).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacement_game_gets_fresh_expiry() {
        let (games, old) = setup();
        let ttl = games.ctx.config.state_ttl();
        games.create(&old).await.unwrap();
        tokio::time::advance(ttl - Duration::from_secs(60)).await;

        let mut replacement = old.clone();
        replacement.game_id = GameId::new();
        games.create(&replacement).await.unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;
        let loaded = games.load(old.room_id).await.unwrap().unwrap();
        assert_eq!(loaded.game_id, replacement.game_id);
    }

    #[tokio::test]
    async fn test_purge_removes_game_keys() {
        let (games, state) = setup();
        games.create(&state).await.unwrap();
        let store = Arc::clone(&games.ctx.store);
        let alice = PlayerId::new();
        let ttl = games.ctx.config.state_ttl();
        store
            .set(&keys::card_owner(state.game_id, CardId(1)), &alice.to_string(), ttl)
            .await
            .unwrap();
        store
            .sadd(&keys::player_cards(state.game_id, alice), "1", ttl)
            .await
            .unwrap();
        store
            .sadd(&keys::marked_numbers(state.game_id, alice, CardId(1)), "5", ttl)
            .await
            .unwrap();
        games.record_draw(state.game_id, 5, 1).await.unwrap();

        games.purge(&state).await.unwrap();

        assert!(games.load(state.room_id).await.unwrap().is_none());
        assert!(games.active_rooms().await.unwrap().is_empty());
        for key in [
            keys::card_owner(state.game_id, CardId(1)),
            keys::player_cards(state.game_id, alice),
            keys::marked_numbers(state.game_id, alice, CardId(1)),
            keys::drawn_numbers(state.game_id),
        ] {
            assert!(!store.exists(&key).await.unwrap(), "{key} survived purge");
        }
    }

    #[tokio::test]
    async fn test_purge_keeps_replacement_game() {
        let (games, old) = setup();
        games.create(&old).await.unwrap();
        let mut replacement = old.clone();
        replacement.game_id = GameId::new();
        games.create(&replacement).await.unwrap();

        games.purge(&old).await.unwrap();
        let loaded = games.load(old.room_id).await.unwrap().unwrap();
        assert_eq!(loaded.game_id, replacement.game_id);
    }
}
