//! Card claim arbitration: exclusive, rate-limited card ownership.
//!
//! A claim takes the card lock (re-entrant for the same player), checks the
//! ownership record, takes the player lock, checks the per-player limit,
//! then writes ownership with set-if-absent. Both locks are released on
//! every path. A release takes the same two locks and removes every trace
//! of the card from the player.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use bingo_cache::LockToken;
use bingo_cache::keys;
use bingo_core::error::AppError;
use bingo_core::events::OutboundEvent;
use bingo_core::result::AppResult;
use bingo_core::types::{CardId, GameId, GameState, PlayerId};

use crate::context::EngineContext;
use crate::error::{CardClaimError, CardReleaseError};

/// Result of one release attempt.
enum Attempt {
    /// Ownership check failed; not retried.
    Rejected(CardReleaseError),
    /// A lock was held by someone else.
    Busy,
    /// The store failed.
    Store(AppError),
}

impl From<AppError> for Attempt {
    fn from(err: AppError) -> Self {
        Self::Store(err)
    }
}

/// Arbitrates card ownership among the players of a game.
#[derive(Debug, Clone)]
pub struct ClaimArbiter {
    ctx: EngineContext,
}

impl ClaimArbiter {
    /// Create an arbiter.
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Claim `card_id` for `player_id`.
    ///
    /// Returns `true` if newly claimed, `false` if the player already owned it.
    pub async fn claim_card(
        &self,
        game: &GameState,
        player_id: PlayerId,
        card_id: CardId,
    ) -> Result<bool, CardClaimError> {
        if card_id.0 == 0 {
            return Err(CardClaimError::InvalidCardId(card_id.to_string()));
        }
        if !game.has_card(card_id) {
            return Err(CardClaimError::CardDoesNotExist(card_id));
        }

        let game_id = game.game_id;
        let card_key = keys::locks::card(game_id, card_id);
        let card_token = LockToken::for_owner(player_id);
        let acquired = self
            .ctx
            .locks
            .acquire_reentrant(&card_key, &card_token, self.ctx.config.locks.card_ttl())
            .await?;
        if !acquired {
            return Err(CardClaimError::CardLocked(card_id));
        }

        let result = self.claim_with_card_lock(game_id, player_id, card_id).await;
        self.ctx.locks.release_quietly(&card_key, &card_token).await;

        if let Ok(true) = result {
            info!(game_id = %game_id, player_id = %player_id, card_id = %card_id, "Card claimed");
            self.ctx
                .bus
                .broadcast(
                    game.room_id,
                    OutboundEvent::CardSelected {
                        game_id,
                        card_id,
                        player_id,
                    },
                )
                .await;
        }
        result
    }

    async fn claim_with_card_lock(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        card_id: CardId,
    ) -> Result<bool, CardClaimError> {
        match self.owner_of(game_id, card_id).await? {
            Some(owner) if owner == player_id => return Ok(false),
            Some(_) => return Err(CardClaimError::CardTaken(card_id)),
            None => {}
        }

        let user_key = keys::locks::user(game_id, player_id);
        let user_token = LockToken::new();
        let acquired = self
            .ctx
            .locks
            .acquire(&user_key, &user_token, self.ctx.config.locks.user_ttl())
            .await?;
        if !acquired {
            return Err(CardClaimError::UserBusy);
        }

        let result = self.assign(game_id, player_id, card_id).await;
        self.ctx.locks.release_quietly(&user_key, &user_token).await;
        result
    }

    async fn assign(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        card_id: CardId,
    ) -> Result<bool, CardClaimError> {
        let store = &self.ctx.store;
        let ttl = self.ctx.config.state_ttl();
        let limit = self.ctx.config.max_cards_per_player;

        let player_key = keys::player_cards(game_id, player_id);
        if store.scard(&player_key).await? >= u64::from(limit) {
            return Err(CardClaimError::UserLimit { limit });
        }

        let owner_key = keys::card_owner(game_id, card_id);
        let owner = player_id.to_string();
        if !store.set_nx(&owner_key, &owner, ttl).await? {
            return Err(CardClaimError::CardTaken(card_id));
        }

        let card = card_id.to_string();
        let indexed = async {
            store.sadd(&player_key, &card, ttl).await?;
            store.sadd(&keys::selected_cards(game_id), &card, ttl).await
        }
        .await;
        if let Err(e) = indexed {
            // Undo the ownership record so the card is claimable again.
            if let Err(undo) = store.delete_if_eq(&owner_key, &owner).await {
                warn!(game_id = %game_id, card_id = %card_id, error = %undo, "Failed to undo card ownership");
            }
            if let Err(undo) = store.srem(&player_key, &card).await {
                warn!(game_id = %game_id, card_id = %card_id, error = %undo, "Failed to undo player card index");
            }
            return Err(e.into());
        }
        Ok(true)
    }

    /// Release `card_id` held by `player_id`.
    ///
    /// Busy locks and transient store failures are retried with backoff.
    pub async fn release_card(
        &self,
        game: &GameState,
        player_id: PlayerId,
        card_id: CardId,
    ) -> Result<(), CardReleaseError> {
        let attempts = self.ctx.config.release_attempts.max(1);
        let policy = self.ctx.retry.with_attempts(attempts);

        for failure in 0..attempts {
            match self.try_release(game.game_id, player_id, card_id).await {
                Ok(()) => {
                    info!(game_id = %game.game_id, player_id = %player_id, card_id = %card_id, "Card released");
                    self.ctx
                        .bus
                        .broadcast(
                            game.room_id,
                            OutboundEvent::CardReleased {
                                game_id: game.game_id,
                                card_id,
                                player_id,
                            },
                        )
                        .await;
                    return Ok(());
                }
                Err(Attempt::Rejected(e)) => return Err(e),
                Err(Attempt::Busy) => {
                    debug!(card_id = %card_id, attempt = failure + 1, "Card release lock busy");
                }
                Err(Attempt::Store(e)) if e.is_transient() => {
                    warn!(card_id = %card_id, attempt = failure + 1, error = %e, "Transient failure releasing card");
                }
                Err(Attempt::Store(e)) => return Err(CardReleaseError::Store(e)),
            }
            if failure + 1 < attempts {
                tokio::time::sleep(policy.delay_for(failure)).await;
            }
        }

        Err(CardReleaseError::RetriesExhausted { card_id, attempts })
    }

    async fn try_release(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        card_id: CardId,
    ) -> Result<(), Attempt> {
        match self.owner_of(game_id, card_id).await? {
            None => return Err(Attempt::Rejected(CardReleaseError::CardNotOwned(card_id))),
            Some(owner) if owner != player_id => {
                return Err(Attempt::Rejected(CardReleaseError::NotOwner(card_id)));
            }
            Some(_) => {}
        }

        let locks = &self.ctx.locks;
        let card_key = keys::locks::card(game_id, card_id);
        let card_token = LockToken::for_owner(player_id);
        if !locks
            .acquire_reentrant(&card_key, &card_token, self.ctx.config.locks.card_ttl())
            .await?
        {
            return Err(Attempt::Busy);
        }

        let user_key = keys::locks::user(game_id, player_id);
        let user_token = LockToken::new();
        let result = match locks
            .acquire(&user_key, &user_token, self.ctx.config.locks.user_ttl())
            .await
        {
            Ok(true) => {
                let removed = self.unassign(game_id, player_id, card_id).await;
                locks.release_quietly(&user_key, &user_token).await;
                removed
            }
            Ok(false) => Err(Attempt::Busy),
            Err(e) => Err(Attempt::Store(e)),
        };
        locks.release_quietly(&card_key, &card_token).await;
        result
    }

    async fn unassign(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        card_id: CardId,
    ) -> Result<(), Attempt> {
        let store = &self.ctx.store;
        let owner_key = keys::card_owner(game_id, card_id);
        if !store.delete_if_eq(&owner_key, &player_id.to_string()).await? {
            return Err(Attempt::Rejected(CardReleaseError::CardNotOwned(card_id)));
        }
        let card = card_id.to_string();
        store
            .srem(&keys::player_cards(game_id, player_id), &card)
            .await?;
        store.srem(&keys::selected_cards(game_id), &card).await?;
        store
            .delete(&keys::marked_numbers(game_id, player_id, card_id))
            .await?;
        Ok(())
    }

    /// Release every card `player_id` owns. Returns the released ids.
    pub async fn release_all(&self, game: &GameState, player_id: PlayerId) -> AppResult<Vec<CardId>> {
        let owned = self.owned_cards(game.game_id, player_id).await?;
        let mut released = Vec::with_capacity(owned.len());
        for card_id in owned {
            match self.release_card(game, player_id, card_id).await {
                Ok(()) => released.push(card_id),
                Err(e) => {
                    warn!(
                        game_id = %game.game_id,
                        player_id = %player_id,
                        card_id = %card_id,
                        code = e.code(),
                        "Failed to release card"
                    );
                }
            }
        }
        Ok(released)
    }

    /// Cards owned by a player.
    pub async fn owned_cards(&self, game_id: GameId, player_id: PlayerId) -> AppResult<BTreeSet<CardId>> {
        let members = self
            .ctx
            .store
            .smembers(&keys::player_cards(game_id, player_id))
            .await?;
        Ok(members.iter().filter_map(|m| m.parse().ok()).collect())
    }

    /// Current owner of a card.
    pub async fn owner_of(&self, game_id: GameId, card_id: CardId) -> AppResult<Option<PlayerId>> {
        let owner = self.ctx.store.get(&keys::card_owner(game_id, card_id)).await?;
        Ok(owner.and_then(|o| o.parse().ok()))
    }

    /// Numbers a player marked on one card.
    pub async fn marked_numbers(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        card_id: CardId,
    ) -> AppResult<BTreeSet<u8>> {
        let members = self
            .ctx
            .store
            .smembers(&keys::marked_numbers(game_id, player_id, card_id))
            .await?;
        Ok(members.iter().filter_map(|m| m.parse().ok()).collect())
    }

    /// Add or remove a mark, returning the resulting marked set.
    pub async fn set_mark(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        card_id: CardId,
        number: u8,
        marked: bool,
    ) -> AppResult<BTreeSet<u8>> {
        let key = keys::marked_numbers(game_id, player_id, card_id);
        if marked {
            self.ctx
                .store
                .sadd(&key, &number.to_string(), self.ctx.config.state_ttl())
                .await?;
        } else {
            self.ctx.store.srem(&key, &number.to_string()).await?;
        }
        self.marked_numbers(game_id, player_id, card_id).await
    }
}
