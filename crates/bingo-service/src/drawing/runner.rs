//! Single-owner number drawing loop.
//!
//! The instance that takes a game's drawing lock drives the loop. Each tick
//! renews the lock, then draws one number under the game's state lock after
//! re-reading the canonical state. A stop signal on the game's control
//! channel cancels the loop between ticks. When every number is drawn and
//! no claim arrives within the grace window, the game ends without a
//! winner. The drawing lock is released on every exit path.

use futures::StreamExt;
use rand::seq::IndexedRandom;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use bingo_cache::LockToken;
use bingo_cache::keys;
use bingo_core::events::{ControlSignal, OutboundEvent};
use bingo_core::result::AppResult;
use bingo_core::types::{GameId, GameState, GameStatus, RoomId};

use crate::context::EngineContext;
use crate::drawing::phase::{DrawPhase, DrawSummary, PhaseTracker};
use crate::events::ControlStream;
use crate::error::GameError;
use crate::game::finalize::Finalizer;
use crate::game::store::GameStore;

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Drawn { number: u8, sequence: u32, remaining: u32 },
    /// The picked number was already recorded; nothing was drawn.
    Skipped { number: u8 },
    Stopped,
    Exhausted,
}

/// Drives the number draw of games this instance owns.
#[derive(Debug, Clone)]
pub struct DrawingLoop {
    ctx: EngineContext,
    games: GameStore,
    finalizer: Finalizer,
}

impl DrawingLoop {
    /// Create a drawing loop.
    pub fn new(ctx: EngineContext, games: GameStore, finalizer: Finalizer) -> Self {
        Self {
            ctx,
            games,
            finalizer,
        }
    }

    /// Become the drawing owner of a game and spawn its loop.
    ///
    /// Returns `None` when another instance already owns the draw.
    pub async fn try_start(
        &self,
        room_id: RoomId,
        game_id: GameId,
    ) -> AppResult<Option<JoinHandle<DrawSummary>>> {
        let key = keys::locks::drawing(game_id);
        let token = LockToken::new();
        if !self
            .ctx
            .locks
            .acquire(&key, &token, self.ctx.config.locks.drawing_ttl())
            .await?
        {
            debug!(game_id = %game_id, "Drawing owned by another instance");
            return Ok(None);
        }

        let control = match self.ctx.bus.subscribe_control(game_id).await {
            Ok(control) => control,
            Err(e) => {
                self.ctx.locks.release_quietly(&key, &token).await;
                return Err(e);
            }
        };

        info!(room_id = %room_id, game_id = %game_id, "Drawing loop started");
        let this = self.clone();
        Ok(Some(tokio::spawn(async move {
            this.run(room_id, game_id, token, control).await
        })))
    }

    async fn run(
        &self,
        room_id: RoomId,
        game_id: GameId,
        token: LockToken,
        control: ControlStream,
    ) -> DrawSummary {
        let cancel = CancellationToken::new();
        let listener = tokio::spawn(listen(game_id, control, cancel.clone()));

        let mut tracker = PhaseTracker::new(game_id);
        tracker.advance(DrawPhase::Running);

        if let Err(e) = self
            .draw_until_stopped(room_id, game_id, &token, &cancel, &mut tracker)
            .await
        {
            error!(game_id = %game_id, error = %e, "Drawing loop failed");
        }

        if tracker.phase() == DrawPhase::Exhausted {
            self.finish_exhausted(room_id, game_id, &cancel, &mut tracker)
                .await;
        }

        cancel.cancel();
        listener.abort();
        self.ctx
            .locks
            .release_quietly(&keys::locks::drawing(game_id), &token)
            .await;
        tracker.advance(DrawPhase::Done);

        let summary = tracker.finish();
        info!(game_id = %game_id, drawn = summary.drawn, "Drawing loop finished");
        summary
    }

    async fn draw_until_stopped(
        &self,
        room_id: RoomId,
        game_id: GameId,
        token: &LockToken,
        cancel: &CancellationToken,
        tracker: &mut PhaseTracker,
    ) -> Result<(), GameError> {
        let lock_key = keys::locks::drawing(game_id);
        let max_failures = self.ctx.retry.attempts();
        let mut failures = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracker.advance(DrawPhase::StoppedBySignal);
                    return Ok(());
                }
                _ = tokio::time::sleep(self.ctx.config.draw_interval()) => {}
            }

            if !self
                .ctx
                .locks
                .extend(&lock_key, token, self.ctx.config.locks.drawing_ttl())
                .await?
            {
                warn!(game_id = %game_id, "Drawing lock lost, stopping");
                return Ok(());
            }

            match self.tick(room_id, game_id).await {
                Ok(Tick::Drawn {
                    number,
                    sequence,
                    remaining,
                }) => {
                    failures = 0;
                    tracker.count_draw();
                    debug!(game_id = %game_id, number, sequence, "Number drawn");
                    self.ctx
                        .bus
                        .broadcast(
                            room_id,
                            OutboundEvent::NumberDrawn {
                                game_id,
                                number,
                                sequence,
                                remaining,
                            },
                        )
                        .await;
                    if remaining == 0 {
                        tracker.advance(DrawPhase::Exhausted);
                        return Ok(());
                    }
                }
                Ok(Tick::Skipped { number }) => {
                    debug!(game_id = %game_id, number, "Draw skipped, retrying next tick");
                }
                Ok(Tick::Stopped) => {
                    tracker.advance(DrawPhase::StoppedBySignal);
                    return Ok(());
                }
                Ok(Tick::Exhausted) => {
                    tracker.advance(DrawPhase::Exhausted);
                    return Ok(());
                }
                Err(e) if is_retryable(&e) && failures + 1 < max_failures => {
                    failures += 1;
                    warn!(game_id = %game_id, failures, error = %e, "Skipping draw tick");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Draw one number under the state lock.
    async fn tick(&self, room_id: RoomId, game_id: GameId) -> Result<Tick, GameError> {
        let lock = self.games.lock_state(game_id).await?;
        let result = self.draw_locked(room_id, game_id).await;
        self.games.unlock_state(game_id, &lock).await;
        result
    }

    async fn draw_locked(&self, room_id: RoomId, game_id: GameId) -> Result<Tick, GameError> {
        match self.games.load(room_id).await? {
            Some(mut state) if state.game_id == game_id => self.draw_from(&mut state).await,
            _ => Ok(Tick::Stopped),
        }
    }

    /// Draw the next number for the game `state` was read from.
    async fn draw_from(&self, state: &mut GameState) -> Result<Tick, GameError> {
        if state.ended || state.stop_number_drawing || state.status != GameStatus::Playing {
            return Ok(Tick::Stopped);
        }

        let game_id = state.game_id;
        let undrawn = state.undrawn_numbers();
        let Some(number) = pick(&undrawn) else {
            return Ok(Tick::Exhausted);
        };
        let sequence = state.drawn_numbers.len() as u32 + 1;
        if !self.games.record_draw(game_id, number, sequence).await? {
            warn!(game_id = %game_id, number, "Number already drawn, skipping");
            return Ok(Tick::Skipped { number });
        }
        // Touch the hash so the game is not considered stale.
        self.games.save(state).await?;

        Ok(Tick::Drawn {
            number,
            sequence,
            remaining: undrawn.len() as u32 - 1,
        })
    }

    /// Wait out the grace window, then end the game unless a claim is pending.
    async fn finish_exhausted(
        &self,
        room_id: RoomId,
        game_id: GameId,
        cancel: &CancellationToken,
        tracker: &mut PhaseTracker,
    ) {
        let claim_key = keys::locks::claim(game_id);
        for _ in 0..self.ctx.retry.attempts() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(game_id = %game_id, "Stop signal during grace window");
                    return;
                }
                _ = tokio::time::sleep(self.ctx.config.no_winner_grace()) => {}
            }
            match self.ctx.locks.holder(&claim_key).await {
                Ok(None) => break,
                Ok(Some(_)) => debug!(game_id = %game_id, "Claim pending, extending grace window"),
                Err(e) => warn!(game_id = %game_id, error = %e, "Failed to check pending claim"),
            }
        }

        tracker.advance(DrawPhase::Finalizing);
        match self.finalizer.finish_without_winner(room_id, game_id).await {
            Ok(Some(_)) => {}
            Ok(None) => debug!(game_id = %game_id, "Game already finalized"),
            Err(e) => error!(game_id = %game_id, code = e.code(), error = %e, "No-winner finalization failed"),
        }
    }
}

fn pick(numbers: &[u8]) -> Option<u8> {
    numbers.choose(&mut rand::rng()).copied()
}

fn is_retryable(err: &GameError) -> bool {
    match err {
        GameError::LockBusy => true,
        GameError::Store(e) => e.is_transient(),
        _ => false,
    }
}

/// Cancel `cancel` on the first stop signal for the game.
async fn listen(game_id: GameId, mut control: ControlStream, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            signal = control.next() => match signal {
                Some(ControlSignal::StopDrawing { reason, .. }) => {
                    info!(game_id = %game_id, reason = %reason, "Stop signal received");
                    cancel.cancel();
                    return;
                }
                None => return,
            },
        }
    }
}
