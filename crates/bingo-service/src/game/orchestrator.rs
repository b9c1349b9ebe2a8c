//! Game session orchestrator: the sole mutator of a room's game state.
//!
//! Operations are split by concern:
//!
//! - this module: game initialization, state queries, card selection
//! - [`membership`](super::membership): join and leave
//! - [`countdown`](super::countdown): countdown start and completion
//! - [`bingo`](super::bingo): win claims
//! - [`marks`](super::marks): marking numbers

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{debug, info, warn};

use bingo_cache::LockToken;
use bingo_cache::keys;
use bingo_core::events::{GameSnapshot, PlayerCard, PlayerView};
use bingo_core::result::AppResult;
use bingo_core::types::{CardId, GameId, GameState, GameStatus, PlayerId, RoomId};

use crate::card::{CardPoolStore, ClaimArbiter};
use crate::context::{Collaborators, EngineContext};
use crate::drawing::DrawingLoop;
use crate::error::GameError;
use crate::game::finalize::Finalizer;
use crate::game::store::GameStore;

/// Coordinates the lifecycle of every room's current game.
#[derive(Debug, Clone)]
pub struct GameOrchestrator {
    pub(crate) ctx: EngineContext,
    pub(crate) collaborators: Collaborators,
    pub(crate) games: GameStore,
    pub(crate) pools: CardPoolStore,
    pub(crate) cards: ClaimArbiter,
    pub(crate) drawing: DrawingLoop,
    pub(crate) finalizer: Finalizer,
}

impl GameOrchestrator {
    /// Wire the orchestrator and the services it drives.
    pub fn new(ctx: EngineContext, collaborators: Collaborators) -> Self {
        let games = GameStore::new(ctx.clone());
        let pools = CardPoolStore::new(ctx.clone());
        let cards = ClaimArbiter::new(ctx.clone());
        let finalizer = Finalizer::new(
            ctx.clone(),
            games.clone(),
            pools.clone(),
            collaborators.rooms.clone(),
        );
        let drawing = DrawingLoop::new(ctx.clone(), games.clone(), finalizer.clone());
        Self {
            ctx,
            collaborators,
            games,
            pools,
            cards,
            drawing,
            finalizer,
        }
    }

    /// Shared engine handles.
    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Game state persistence.
    pub fn games(&self) -> &GameStore {
        &self.games
    }

    /// End-of-game bookkeeping.
    pub fn finalizer(&self) -> &Finalizer {
        &self.finalizer
    }

    /// Card ownership.
    pub fn cards(&self) -> &ClaimArbiter {
        &self.cards
    }

    /// The room's current game, whatever its status.
    pub async fn current_game(&self, room_id: RoomId) -> Result<GameState, GameError> {
        self.games
            .load(room_id)
            .await?
            .ok_or(GameError::GameNotFound)
    }

    /// Take over the draw of a PLAYING game whose drawing owner is gone.
    ///
    /// A no-op returning `false` while another instance holds the drawing
    /// lock or the game is no longer drawing.
    pub async fn resume_drawing(&self, room_id: RoomId, game_id: GameId) -> AppResult<bool> {
        match self.games.load(room_id).await? {
            Some(state) if state.game_id == game_id && state.is_drawing() => {}
            _ => return Ok(false),
        }
        let started = self.drawing.try_start(room_id, game_id).await?.is_some();
        if started {
            info!(room_id = %room_id, game_id = %game_id, "Drawing taken over");
        }
        Ok(started)
    }

    /// The room's live game, creating one when there is none or the current
    /// one is completed or stale.
    pub async fn active_game(&self, room_id: RoomId) -> Result<GameState, GameError> {
        let stale_after = self.ctx.config.stale_after();
        if let Some(state) = self.games.load(room_id).await? {
            if !state.is_replaceable(Utc::now(), stale_after) {
                return Ok(state);
            }
        }

        let key = keys::locks::init(room_id);
        let token = LockToken::new();
        if !self
            .ctx
            .locks
            .acquire_with_retry(&key, &token, self.ctx.config.locks.init_ttl(), &self.ctx.retry)
            .await?
        {
            return Err(GameError::LockBusy);
        }
        let result = self.initialize(room_id).await;
        self.ctx.locks.release_quietly(&key, &token).await;

        let (state, replaced) = result?;
        if let Some(stale) = replaced {
            warn!(room_id = %room_id, game_id = %stale.game_id, "Replacing stale game");
            if let Err(e) = self.finalizer.purge(&stale).await {
                warn!(game_id = %stale.game_id, error = %e, "Failed to purge stale game");
            }
        }
        Ok(state)
    }

    /// Create the room's next game. Runs under the init lock.
    ///
    /// Also returns the replaced game when it was stale rather than completed.
    async fn initialize(
        &self,
        room_id: RoomId,
    ) -> Result<(GameState, Option<GameState>), GameError> {
        let now = Utc::now();
        let stale_after = self.ctx.config.stale_after();
        let previous = self.games.load(room_id).await?;
        if let Some(state) = &previous {
            if !state.is_replaceable(now, stale_after) {
                debug!(room_id = %room_id, "Game initialized by another request");
                return Ok((state.clone(), None));
            }
        }

        let mut room = self
            .collaborators
            .rooms
            .find_room(room_id)
            .await?
            .ok_or(GameError::RoomNotFound)?;
        if room.min_players == 0 {
            room.min_players = self.ctx.config.min_players;
        }

        let game_id = GameId::new();
        let pool = self.pools.create(game_id).await?;
        let state = GameState::new(game_id, &room, pool.len() as u32, now);
        self.games.create(&state).await?;
        self.finalizer.record(&state).await;
        info!(room_id = %room_id, game_id = %game_id, cards = pool.len(), "Game initialized");

        let replaced = previous.filter(|p| p.status.is_active() && !p.ended);
        Ok((state, replaced))
    }

    /// Snapshot of the room's game, as seen by `viewer`.
    ///
    /// A completed game stays visible until it is purged.
    pub async fn get_state(
        &self,
        room_id: RoomId,
        viewer: Option<PlayerId>,
    ) -> Result<GameSnapshot, GameError> {
        let state = match self.games.load(room_id).await? {
            Some(state) if !state.is_stale(Utc::now(), self.ctx.config.stale_after()) => state,
            _ => self.active_game(room_id).await?,
        };
        Ok(self.snapshot(state, viewer).await?)
    }

    /// Build a snapshot including the viewer's cards and marks.
    pub async fn snapshot(
        &self,
        game: GameState,
        viewer: Option<PlayerId>,
    ) -> AppResult<GameSnapshot> {
        let Some(player_id) = viewer else {
            return Ok(GameSnapshot { game, player: None });
        };
        let owned = self.cards.owned_cards(game.game_id, player_id).await?;
        let mut cards = Vec::with_capacity(owned.len());
        for card_id in owned {
            let Some(card) = self.pools.card(game.game_id, card_id).await? else {
                continue;
            };
            let marked_numbers = self
                .cards
                .marked_numbers(game.game_id, player_id, card_id)
                .await?;
            cards.push(PlayerCard {
                card_id,
                grid: card.grid,
                marked_numbers,
            });
        }
        let player = PlayerView {
            player_id,
            joined: game.is_member(&player_id),
            cards,
        };
        Ok(GameSnapshot {
            game,
            player: Some(player),
        })
    }

    /// Claim a card before the game starts.
    ///
    /// Returns `false` when the player already owned it.
    pub async fn select_card(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        card_id: CardId,
    ) -> Result<bool, GameError> {
        let state = self.active_game(room_id).await?;
        ensure_not_started(&state)?;
        Ok(self.cards.claim_card(&state, player_id, card_id).await?)
    }

    /// Release a card before the game starts.
    pub async fn release_card(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        card_id: CardId,
    ) -> Result<(), GameError> {
        let state = self.current_game(room_id).await?;
        ensure_not_started(&state)?;
        Ok(self.cards.release_card(&state, player_id, card_id).await?)
    }

    /// Cards the player owns in the room's current game.
    pub async fn owned_cards(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
    ) -> Result<BTreeSet<CardId>, GameError> {
        let state = self.current_game(room_id).await?;
        Ok(self.cards.owned_cards(state.game_id, player_id).await?)
    }
}

/// Reject once the game moved past READY/COUNTDOWN.
pub(crate) fn ensure_not_started(state: &GameState) -> Result<(), GameError> {
    match state.status {
        GameStatus::Ready | GameStatus::Countdown if !state.started && !state.ended => Ok(()),
        _ => Err(GameError::GameAlreadyStarted),
    }
}
