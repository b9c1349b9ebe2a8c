//! Joining and leaving a game.
//!
//! A join first reserves a pending seat under the state lock so the
//! capacity check holds, then charges the entry fee. Only a paid seat is
//! turned into membership, again under the state lock and only before the
//! start; a decline releases the seat and a failed confirmation refunds.

use tracing::{debug, error, info, warn};

use bingo_core::events::OutboundEvent;
use bingo_core::types::{CardId, GameId, GameState, PlayerId, RoomId};

use crate::error::GameError;
use crate::game::orchestrator::{GameOrchestrator, ensure_not_started};

/// A join request as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Joining player.
    pub player_id: PlayerId,
    /// Fee the client believes applies; the room's configuration wins.
    pub fee: Option<u64>,
    /// Capacity the client believes applies; the room's configuration wins.
    pub capacity: Option<u32>,
    /// Cards the client believes it owns.
    pub selected_card_ids: Vec<CardId>,
}

impl JoinRequest {
    /// A request with no client-side expectations.
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            fee: None,
            capacity: None,
            selected_card_ids: Vec::new(),
        }
    }
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// The player joined and paid.
    Joined(GameState),
    /// The player was already a member; nothing was charged.
    AlreadyJoined(GameState),
}

impl JoinOutcome {
    /// Game state after the join.
    pub fn state(&self) -> &GameState {
        match self {
            Self::Joined(state) | Self::AlreadyJoined(state) => state,
        }
    }
}

/// Result of a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The player left before the start.
    Left {
        /// Whether the entry fee was refunded.
        refunded: bool,
    },
    /// The game already started; the player stays and nothing is refunded.
    AfterStart,
}

impl GameOrchestrator {
    /// Join the room's current game.
    pub async fn join(&self, room_id: RoomId, request: JoinRequest) -> Result<JoinOutcome, GameError> {
        let player_id = request.player_id;
        let state = self.current_game(room_id).await?;
        if request.fee.is_some_and(|fee| fee != state.entry_fee) {
            warn!(room_id = %room_id, player_id = %player_id, fee = ?request.fee, expected = state.entry_fee, "Join fee mismatch");
        }
        if request.capacity.is_some_and(|capacity| capacity != state.capacity) {
            warn!(room_id = %room_id, player_id = %player_id, capacity = ?request.capacity, expected = state.capacity, "Join capacity mismatch");
        }
        ensure_not_started(&state)?;
        if state.is_member(&player_id) {
            return Ok(JoinOutcome::AlreadyJoined(state));
        }

        let owned = self.cards.owned_cards(state.game_id, player_id).await?;
        if owned.is_empty() {
            return Err(GameError::NoCardsSelected);
        }
        if let Some(card_id) = request
            .selected_card_ids
            .iter()
            .find(|card_id| !owned.contains(card_id))
        {
            return Err(GameError::CardNotOwned(*card_id));
        }

        let game_id = state.game_id;
        let lock = self.games.lock_state(game_id).await?;
        let reserved = self.reserve_seat(room_id, game_id, player_id).await;
        self.games.unlock_state(game_id, &lock).await;
        if let Some(state) = reserved? {
            return Ok(JoinOutcome::AlreadyJoined(state));
        }

        match self
            .collaborators
            .payments
            .charge(player_id, state.entry_fee, game_id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                self.release_seat(game_id, player_id).await;
                warn!(game_id = %game_id, player_id = %player_id, "Entry fee declined");
                return Err(GameError::PaymentFailed);
            }
            Err(e) => {
                self.release_seat(game_id, player_id).await;
                error!(game_id = %game_id, player_id = %player_id, error = %e, "Entry fee charge failed");
                return Err(GameError::Payment(e));
            }
        }

        let state = match self.confirm_seat(room_id, game_id, player_id).await {
            Ok(state) => state,
            Err(e) => {
                warn!(game_id = %game_id, player_id = %player_id, code = e.code(), "Paid join not confirmed, refunding");
                self.refund(game_id, player_id).await;
                self.release_seat(game_id, player_id).await;
                return Err(e);
            }
        };

        info!(game_id = %game_id, player_id = %player_id, players = state.player_count(), "Player joined");
        self.ctx
            .bus
            .broadcast(
                room_id,
                OutboundEvent::PlayerJoined {
                    game_id,
                    player_id,
                    player_count: state.player_count(),
                    joined_players: state.joined_players.clone(),
                },
            )
            .await;

        self.maybe_start_countdown(&state).await;
        Ok(JoinOutcome::Joined(state))
    }

    /// Check capacity and reserve a pending seat. Runs under the state lock.
    ///
    /// Pending seats count against capacity but not towards the start
    /// threshold. Returns the state when the player already was a member.
    async fn reserve_seat(
        &self,
        room_id: RoomId,
        game_id: GameId,
        player_id: PlayerId,
    ) -> Result<Option<GameState>, GameError> {
        let state = match self.games.load(room_id).await? {
            Some(state) if state.game_id == game_id => state,
            _ => return Err(GameError::GameNotFound),
        };
        ensure_not_started(&state)?;
        if state.is_member(&player_id) {
            return Ok(Some(state));
        }
        if self.games.is_pending(game_id, player_id).await? {
            debug!(game_id = %game_id, player_id = %player_id, "Join already in progress");
            return Err(GameError::LockBusy);
        }
        let pending = self.games.pending_count(game_id).await?;
        if !state.has_capacity(pending) {
            return Err(GameError::GameFull);
        }
        self.games.add_pending(game_id, player_id).await?;
        Ok(None)
    }

    /// Turn a paid seat into membership.
    ///
    /// The player enters the joined set under the state lock and only while
    /// the game has not started, so a started game never loses a member to a
    /// failed join.
    async fn confirm_seat(
        &self,
        room_id: RoomId,
        game_id: GameId,
        player_id: PlayerId,
    ) -> Result<GameState, GameError> {
        let lock = self.games.lock_state(game_id).await?;
        let result = self.confirm_locked(room_id, game_id, player_id).await;
        self.games.unlock_state(game_id, &lock).await;
        result
    }

    async fn confirm_locked(
        &self,
        room_id: RoomId,
        game_id: GameId,
        player_id: PlayerId,
    ) -> Result<GameState, GameError> {
        let mut state = match self.games.load(room_id).await? {
            Some(state) if state.game_id == game_id => state,
            _ => return Err(GameError::GameNotFound),
        };
        ensure_not_started(&state)?;
        self.games.save(&mut state).await?;
        self.games.add_player(game_id, player_id).await?;
        state.joined_players.insert(player_id);
        self.release_seat(game_id, player_id).await;
        Ok(state)
    }

    async fn release_seat(&self, game_id: GameId, player_id: PlayerId) {
        if let Err(e) = self.games.remove_pending(game_id, player_id).await {
            warn!(game_id = %game_id, player_id = %player_id, error = %e, "Failed to release pending seat");
        }
    }

    async fn refund(&self, game_id: GameId, player_id: PlayerId) -> bool {
        match self.collaborators.payments.refund(player_id, game_id).await {
            Ok(refunded) => refunded,
            Err(e) => {
                error!(game_id = %game_id, player_id = %player_id, error = %e, "Entry fee refund failed");
                false
            }
        }
    }

    /// Leave the room's current game.
    pub async fn leave(&self, room_id: RoomId, player_id: PlayerId) -> Result<LeaveOutcome, GameError> {
        let state = self.current_game(room_id).await?;
        if ensure_not_started(&state).is_err() {
            info!(game_id = %state.game_id, player_id = %player_id, "Leave after start acknowledged");
            return Ok(LeaveOutcome::AfterStart);
        }
        if !state.is_member(&player_id) {
            return Err(GameError::NotInGame);
        }

        let game_id = state.game_id;
        let lock = self.games.lock_state(game_id).await?;
        let removed = self.remove_member(room_id, game_id, player_id).await;
        self.games.unlock_state(game_id, &lock).await;
        let state = match removed? {
            Some(state) => state,
            None => return Ok(LeaveOutcome::AfterStart),
        };

        let refunded = self.refund(game_id, player_id).await;
        match self.cards.release_all(&state, player_id).await {
            Ok(released) => {
                info!(game_id = %game_id, player_id = %player_id, cards = released.len(), refunded, "Player left");
            }
            Err(e) => warn!(game_id = %game_id, player_id = %player_id, error = %e, "Failed to release cards on leave"),
        }

        self.ctx
            .bus
            .broadcast(
                room_id,
                OutboundEvent::PlayerLeft {
                    game_id,
                    player_id,
                    player_count: state.player_count(),
                    joined_players: state.joined_players.clone(),
                    refunded,
                },
            )
            .await;
        Ok(LeaveOutcome::Left { refunded })
    }

    /// Remove the player. Runs under the state lock.
    ///
    /// Returns `None` when the game started in the meantime.
    async fn remove_member(
        &self,
        room_id: RoomId,
        game_id: GameId,
        player_id: PlayerId,
    ) -> Result<Option<GameState>, GameError> {
        let mut state = match self.games.load(room_id).await? {
            Some(state) if state.game_id == game_id => state,
            _ => return Err(GameError::GameNotFound),
        };
        if ensure_not_started(&state).is_err() {
            return Ok(None);
        }
        if !self.games.remove_player(game_id, player_id).await? {
            return Err(GameError::NotInGame);
        }
        state.joined_players.remove(&player_id);
        self.games.save(&mut state).await?;
        Ok(Some(state))
    }
}
