//! Money-moving collaborators: entry fee payment and winner payout.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::id::{GameId, PlayerId};

/// Charges and refunds entry fees.
#[async_trait]
pub trait PaymentGateway: Send + Sync + std::fmt::Debug + 'static {
    /// Charge `amount` for joining `game_id`.
    ///
    /// `Ok(false)` means the charge was declined (insufficient funds);
    /// `Err` means the outcome is unknown.
    async fn charge(&self, player_id: PlayerId, amount: u64, game_id: GameId) -> AppResult<bool>;

    /// Refund the entry fee charged for `game_id`. `Ok(false)` if nothing to refund.
    async fn refund(&self, player_id: PlayerId, game_id: GameId) -> AppResult<bool>;
}

/// Pays a game's prize to its winner.
#[async_trait]
pub trait PayoutGateway: Send + Sync + std::fmt::Debug + 'static {
    /// Credit `amount` to `winner_id` for winning `game_id`.
    async fn payout(&self, game_id: GameId, winner_id: PlayerId, amount: u64) -> AppResult<()>;
}
