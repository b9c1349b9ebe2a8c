//! End-of-game bookkeeping shared by the drawing loop, the claim path, and
//! the reaper.

use std::sync::Arc;

use tracing::{error, info, warn};

use bingo_cache::LockToken;
use bingo_cache::keys;
use bingo_core::events::OutboundEvent;
use bingo_core::result::AppResult;
use bingo_core::traits::RoomRepository;
use bingo_core::types::{GameId, GameRecord, GameState, GameStatus, RoomId};

use crate::card::CardPoolStore;
use crate::context::EngineContext;
use crate::error::GameError;
use crate::game::store::GameStore;

/// Result text of a game that ended without a valid claim.
pub const NO_WINNER: &str = "No Winner";

/// Completes games and cleans up after them.
#[derive(Debug, Clone)]
pub struct Finalizer {
    ctx: EngineContext,
    games: GameStore,
    pools: CardPoolStore,
    rooms: Arc<dyn RoomRepository>,
}

impl Finalizer {
    /// Create a finalizer.
    pub fn new(
        ctx: EngineContext,
        games: GameStore,
        pools: CardPoolStore,
        rooms: Arc<dyn RoomRepository>,
    ) -> Self {
        Self {
            ctx,
            games,
            pools,
            rooms,
        }
    }

    /// Complete a game with no winner.
    ///
    /// Returns `None` when another instance holds the end lock or the game
    /// already ended.
    pub async fn finish_without_winner(
        &self,
        room_id: RoomId,
        game_id: GameId,
    ) -> Result<Option<GameState>, GameError> {
        let key = keys::locks::end(game_id);
        let token = LockToken::new();
        if !self
            .ctx
            .locks
            .acquire(&key, &token, self.ctx.config.locks.end_ttl())
            .await?
        {
            info!(game_id = %game_id, "Game is being finalized elsewhere");
            return Ok(None);
        }

        let result = self
            .games
            .update(room_id, game_id, |state| {
                if state.ended || state.status == GameStatus::Completed {
                    return Ok(false);
                }
                state.ended = true;
                state.stop_number_drawing = true;
                state.status = GameStatus::Completed;
                Ok(true)
            })
            .await;
        self.ctx.locks.release_quietly(&key, &token).await;

        let (state, finished) = result?;
        if !finished {
            return Ok(None);
        }

        info!(
            room_id = %room_id,
            game_id = %game_id,
            drawn = state.drawn_numbers.len(),
            "Game completed without a winner"
        );
        self.ctx
            .bus
            .broadcast(
                room_id,
                OutboundEvent::Ended {
                    game_id,
                    has_winner: false,
                    result: NO_WINNER.to_string(),
                    winner: None,
                    drawn_numbers: state.drawn_numbers.clone(),
                },
            )
            .await;
        self.record(&state).await;
        self.schedule_purge(state.clone());
        Ok(Some(state))
    }

    /// Write the game summary, logging failures.
    pub async fn record(&self, state: &GameState) {
        if let Err(e) = self.rooms.upsert_game(&GameRecord::from_state(state)).await {
            error!(game_id = %state.game_id, error = %e, "Failed to persist game summary");
        }
    }

    /// Purge the game's keys once the retention window has passed.
    ///
    /// A game whose prize is still pending is left for the reaper, which
    /// settles the payout before purging.
    pub fn schedule_purge(&self, state: GameState) {
        let this = self.clone();
        let retention = self.ctx.config.post_game_retention();
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            match this.games.load(state.room_id).await {
                Ok(Some(current)) if current.game_id == state.game_id && current.payout_pending => {
                    info!(game_id = %state.game_id, "Payout pending, purge deferred");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(game_id = %state.game_id, error = %e, "Post-game purge deferred");
                    return;
                }
            }
            if let Err(e) = this.purge(&state).await {
                warn!(game_id = %state.game_id, error = %e, "Post-game purge failed");
            }
        });
    }

    /// Delete every key of the game and drop its cached pool.
    pub async fn purge(&self, state: &GameState) -> AppResult<()> {
        self.games.purge(state).await?;
        self.pools.evict(state.game_id).await;
        Ok(())
    }
}
