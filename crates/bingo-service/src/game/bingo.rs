//! Win claims.
//!
//! A claim is validated under the per-game claim lock. A valid claim must
//! then take the end-finalization lock, which the no-winner path also
//! takes, so exactly one finalization and one payout happen per game.
//! Every claim that reaches validation leaves an audit record.
//!
//! The game is marked `payout_pending` when it completes and the flag is
//! cleared once the payout collaborator accepts the prize. A payout that
//! still fails after retries stays pending and is settled later through
//! [`GameOrchestrator::settle_payout`].

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use bingo_cache::LockToken;
use bingo_cache::keys;
use bingo_core::AppError;
use bingo_core::events::{ControlSignal, OutboundEvent};
use bingo_core::types::{
    CardId, ClaimOutcome, ClaimRecord, GameId, GameState, GameStatus, PlayerId, RoomId,
    WinPattern, WinnerInfo,
};

use crate::error::GameError;
use crate::game::orchestrator::GameOrchestrator;
use crate::verifier;

/// A bingo claim as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    /// Claimant.
    pub player_id: PlayerId,
    /// Display name of the claimant.
    pub player_name: String,
    /// Claimed card.
    pub card_id: CardId,
    /// Numbers the client marked on the card.
    pub marked_numbers: BTreeSet<u8>,
    /// Requested pattern name.
    pub pattern: String,
}

impl GameOrchestrator {
    /// Claim a win on the room's current game.
    pub async fn claim_bingo(
        &self,
        room_id: RoomId,
        request: ClaimRequest,
    ) -> Result<WinnerInfo, GameError> {
        let game_id = self.current_game(room_id).await?.game_id;

        let key = keys::locks::claim(game_id);
        let token = LockToken::new();
        if !self
            .ctx
            .locks
            .acquire_with_retry(&key, &token, self.ctx.config.locks.claim_ttl(), &self.ctx.retry)
            .await?
        {
            warn!(game_id = %game_id, player_id = %request.player_id, "Claim lock busy");
            return Err(GameError::LockBusy);
        }
        let result = self.claim_locked(room_id, game_id, &request).await;
        self.ctx.locks.release_quietly(&key, &token).await;
        result
    }

    async fn claim_locked(
        &self,
        room_id: RoomId,
        game_id: GameId,
        request: &ClaimRequest,
    ) -> Result<WinnerInfo, GameError> {
        let state = match self.games.load(room_id).await? {
            Some(state) if state.game_id == game_id => state,
            _ => return Err(GameError::GameNotFound),
        };

        let pattern = match self.validate_claim(&state, request).await {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!(
                    game_id = %game_id,
                    player_id = %request.player_id,
                    card_id = %request.card_id,
                    code = e.code(),
                    "Claim rejected"
                );
                self.audit(&state, request, ClaimOutcome::Rejected, Some(e.code()))
                    .await;
                return Err(e);
            }
        };

        let end_key = keys::locks::end(game_id);
        let end_token = LockToken::new();
        if !self
            .ctx
            .locks
            .acquire(&end_key, &end_token, self.ctx.config.locks.end_ttl())
            .await?
        {
            info!(game_id = %game_id, player_id = %request.player_id, "Game is being ended by another instance");
            let e = GameError::EndedByAnotherInstance;
            self.audit(&state, request, ClaimOutcome::Rejected, Some(e.code()))
                .await;
            return Err(e);
        }

        let winner = WinnerInfo {
            player_id: request.player_id,
            player_name: request.player_name.clone(),
            card_id: request.card_id,
            pattern,
            prize: state.prize(),
        };
        let finished = self.finish_with_winner(room_id, game_id, &winner).await;
        self.ctx.locks.release_quietly(&end_key, &end_token).await;
        let (state, payout) = match finished {
            Ok(finished) => finished,
            Err(e) => {
                warn!(
                    game_id = %game_id,
                    player_id = %request.player_id,
                    code = e.code(),
                    "Valid claim could not complete the game"
                );
                self.audit(&state, request, ClaimOutcome::Rejected, Some(e.code()))
                    .await;
                return Err(e);
            }
        };
        self.audit(
            &state,
            request,
            ClaimOutcome::Won,
            payout.as_ref().err().map(GameError::code),
        )
        .await;

        info!(
            game_id = %game_id,
            player_id = %winner.player_id,
            card_id = %winner.card_id,
            pattern = %winner.pattern,
            prize = winner.prize,
            "Game won"
        );
        self.ctx
            .bus
            .broadcast(
                room_id,
                OutboundEvent::Ended {
                    game_id,
                    has_winner: true,
                    result: format!("{} won with {}", winner.player_name, winner.pattern),
                    winner: Some(winner.clone()),
                    drawn_numbers: state.drawn_numbers.clone(),
                },
            )
            .await;
        self.finalizer.record(&state).await;
        self.finalizer.schedule_purge(state);
        payout.map(|()| winner)
    }

    /// Pay out a completed game whose prize is still pending.
    ///
    /// Returns `false` when there is nothing to settle or another instance
    /// holds the end lock.
    pub async fn settle_payout(&self, room_id: RoomId, game_id: GameId) -> Result<bool, GameError> {
        let key = keys::locks::end(game_id);
        let token = LockToken::new();
        if !self
            .ctx
            .locks
            .acquire(&key, &token, self.ctx.config.locks.end_ttl())
            .await?
        {
            return Ok(false);
        }
        let result = self.settle_locked(room_id, game_id).await;
        self.ctx.locks.release_quietly(&key, &token).await;
        result
    }

    async fn settle_locked(&self, room_id: RoomId, game_id: GameId) -> Result<bool, GameError> {
        let state = match self.games.load(room_id).await? {
            Some(state) if state.game_id == game_id && state.payout_pending => state,
            _ => return Ok(false),
        };
        let Some(winner) = state.winner.clone() else {
            return Ok(false);
        };
        let (state, payout) = self.pay_winner(state, &winner).await;
        payout?;
        info!(
            game_id = %game_id,
            player_id = %winner.player_id,
            prize = winner.prize,
            "Pending payout settled"
        );
        self.finalizer.record(&state).await;
        Ok(true)
    }

    /// Validation in order; the first failure wins.
    async fn validate_claim(
        &self,
        state: &GameState,
        request: &ClaimRequest,
    ) -> Result<WinPattern, GameError> {
        if state.ended || state.status == GameStatus::Completed {
            return Err(GameError::GameAlreadyCompleted);
        }
        if state.status != GameStatus::Playing {
            return Err(GameError::GameNotStarted);
        }
        if !state.is_member(&request.player_id) {
            return Err(GameError::NotAPlayer);
        }
        let owner = self.cards.owner_of(state.game_id, request.card_id).await?;
        if owner != Some(request.player_id) {
            return Err(GameError::CardNotOwned(request.card_id));
        }

        let server_marks = self
            .cards
            .marked_numbers(state.game_id, request.player_id, request.card_id)
            .await?;
        if !server_marks.is_subset(&request.marked_numbers) {
            return Err(GameError::MarkedNumbersMismatch);
        }

        let pattern: WinPattern = request
            .pattern
            .parse()
            .map_err(|_| GameError::InvalidPattern(request.pattern.clone()))?;

        let card = self
            .pools
            .card(state.game_id, request.card_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Card {} missing from pool", request.card_id)))?;
        let drawn: BTreeSet<u8> = state.drawn_numbers.iter().copied().collect();
        let effective: BTreeSet<u8> = request
            .marked_numbers
            .intersection(&drawn)
            .copied()
            .collect();
        if !verifier::verify(&card.grid, &effective, pattern) {
            return Err(GameError::InvalidBingo(pattern.to_string()));
        }
        Ok(pattern)
    }

    /// Complete the game for `winner`. Runs under the end lock.
    ///
    /// Order: state, stop signal, payout. The outer error means the game
    /// was not completed; the inner one reports a payout left pending.
    async fn finish_with_winner(
        &self,
        room_id: RoomId,
        game_id: GameId,
        winner: &WinnerInfo,
    ) -> Result<(GameState, Result<(), GameError>), GameError> {
        let (state, ()) = self
            .games
            .update(room_id, game_id, |state| {
                if state.ended || !state.status.can_transition_to(GameStatus::Completed) {
                    return Err(GameError::GameAlreadyCompleted);
                }
                state.ended = true;
                state.stop_number_drawing = true;
                state.status = GameStatus::Completed;
                state.winner = Some(winner.clone());
                state.payout_pending = true;
                Ok(())
            })
            .await?;

        let signal = ControlSignal::StopDrawing {
            game_id,
            reason: "winner".to_string(),
        };
        if let Err(e) = self.ctx.bus.publish_control(&signal).await {
            warn!(game_id = %game_id, error = %e, "Failed to publish stop signal");
        }

        Ok(self.pay_winner(state, winner).await)
    }

    /// Pay `winner`, retrying transient provider failures, then clear the
    /// pending flag. The payout collaborator pays a game at most once.
    async fn pay_winner(
        &self,
        state: GameState,
        winner: &WinnerInfo,
    ) -> (GameState, Result<(), GameError>) {
        let game_id = state.game_id;
        let paid = self
            .ctx
            .retry
            .retry_transient("payout", || {
                self.collaborators
                    .payouts
                    .payout(game_id, winner.player_id, winner.prize)
            })
            .await;
        if let Err(e) = paid {
            error!(
                game_id = %game_id,
                player_id = %winner.player_id,
                prize = winner.prize,
                error = %e,
                "Payout failed, left pending"
            );
            return (state, Err(GameError::PayoutFailed(e)));
        }

        let cleared = self
            .games
            .update(state.room_id, game_id, |state| {
                state.payout_pending = false;
                Ok(())
            })
            .await;
        match cleared {
            Ok((state, ())) => (state, Ok(())),
            Err(e) => {
                warn!(game_id = %game_id, code = e.code(), "Prize paid but still flagged pending");
                (state, Ok(()))
            }
        }
    }

    async fn audit(
        &self,
        state: &GameState,
        request: &ClaimRequest,
        outcome: ClaimOutcome,
        error: Option<&str>,
    ) {
        let record = ClaimRecord {
            id: Uuid::new_v4(),
            game_id: state.game_id,
            room_id: state.room_id,
            card_id: request.card_id,
            player_id: request.player_id,
            player_name: request.player_name.clone(),
            pattern: request.pattern.clone(),
            marked_numbers: request.marked_numbers.clone(),
            outcome,
            error: error.map(str::to_string),
            created_at: Utc::now(),
        };
        if let Err(e) = self.collaborators.claims.record(&record).await {
            error!(game_id = %state.game_id, error = %e, "Failed to record claim");
        }
    }
}
