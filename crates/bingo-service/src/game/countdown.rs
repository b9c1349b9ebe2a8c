//! Countdown between reaching the player threshold and the first draw.

use chrono::{TimeDelta, Utc};
use tracing::{debug, info, warn};

use bingo_cache::LockToken;
use bingo_cache::keys;
use bingo_core::events::OutboundEvent;
use bingo_core::types::{GameId, GameState, GameStatus, RoomId};

use crate::error::GameError;
use crate::game::orchestrator::GameOrchestrator;

impl GameOrchestrator {
    /// Start the countdown when a READY game reached its player threshold.
    pub(crate) async fn maybe_start_countdown(&self, state: &GameState) {
        if state.status != GameStatus::Ready || !state.has_enough_players() {
            return;
        }
        if let Err(e) = self.start_countdown(state.room_id, state.game_id).await {
            warn!(game_id = %state.game_id, code = e.code(), error = %e, "Failed to start countdown");
        }
    }

    /// Move a READY game to COUNTDOWN and schedule its completion.
    ///
    /// Only the instance holding the countdown lock starts it; the lock is
    /// held until the countdown completes. Returns `false` when nothing was
    /// started.
    pub async fn start_countdown(&self, room_id: RoomId, game_id: GameId) -> Result<bool, GameError> {
        let key = keys::locks::countdown(game_id);
        let token = LockToken::new();
        if !self
            .ctx
            .locks
            .acquire(&key, &token, self.ctx.config.locks.countdown_ttl())
            .await?
        {
            debug!(game_id = %game_id, "Countdown already being started");
            return Ok(false);
        }

        let duration = self.ctx.config.countdown();
        let started = self
            .games
            .update(room_id, game_id, |state| {
                if !state.status.can_transition_to(GameStatus::Countdown)
                    || !state.has_enough_players()
                {
                    return Ok(None);
                }
                let end = Utc::now() + TimeDelta::from_std(duration).unwrap_or(TimeDelta::zero());
                state.status = GameStatus::Countdown;
                state.countdown_end_time = Some(end);
                Ok(Some(end))
            })
            .await;

        let end = match started {
            Ok((_, Some(end))) => end,
            Ok((_, None)) => {
                self.ctx.locks.release_quietly(&key, &token).await;
                return Ok(false);
            }
            Err(e) => {
                self.ctx.locks.release_quietly(&key, &token).await;
                return Err(e);
            }
        };

        info!(room_id = %room_id, game_id = %game_id, seconds = duration.as_secs(), "Countdown started");
        self.ctx
            .bus
            .broadcast(
                room_id,
                OutboundEvent::Countdown {
                    game_id,
                    countdown_end_time: end,
                    seconds: duration.as_secs(),
                },
            )
            .await;

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Err(e) = this.complete_countdown(room_id, game_id).await {
                warn!(game_id = %game_id, code = e.code(), error = %e, "Countdown completion failed");
            }
            this.ctx.locks.release_quietly(&key, &token).await;
        });
        Ok(true)
    }

    /// End a running countdown: start the game if enough players remain,
    /// otherwise go back to READY.
    ///
    /// Also used by the reaper to recover a countdown whose owner died.
    /// Returns the new status, or `None` if no countdown was running.
    pub async fn complete_countdown(
        &self,
        room_id: RoomId,
        game_id: GameId,
    ) -> Result<Option<GameStatus>, GameError> {
        let (state, next) = self
            .games
            .update(room_id, game_id, |state| {
                if state.status != GameStatus::Countdown {
                    return Ok(None);
                }
                state.countdown_end_time = None;
                if state.has_enough_players() {
                    state.status = GameStatus::Playing;
                    state.started = true;
                } else {
                    state.status = GameStatus::Ready;
                }
                Ok(Some(state.status))
            })
            .await?;

        match next {
            Some(GameStatus::Playing) => {
                info!(room_id = %room_id, game_id = %game_id, players = state.player_count(), "Game started");
                self.ctx
                    .bus
                    .broadcast(
                        room_id,
                        OutboundEvent::Started {
                            game_id,
                            player_count: state.player_count(),
                            prize: state.prize(),
                        },
                    )
                    .await;
                self.finalizer.record(&state).await;
                if let Err(e) = self.drawing.try_start(room_id, game_id).await {
                    warn!(game_id = %game_id, error = %e, "Failed to start drawing loop");
                }
            }
            Some(_) => {
                info!(room_id = %room_id, game_id = %game_id, players = state.player_count(), "Countdown aborted");
                self.ctx
                    .bus
                    .broadcast(
                        room_id,
                        OutboundEvent::CountdownAborted {
                            game_id,
                            player_count: state.player_count(),
                            min_players: state.min_players,
                        },
                    )
                    .await;
            }
            None => debug!(game_id = %game_id, "No countdown to complete"),
        }
        Ok(next)
    }
}
