//! Typed rejection outcomes of the game engine.
//!
//! Every variant maps to a stable wire code through `code()`, which becomes
//! `errorType` in the player-targeted `error` event. Infrastructure failures
//! are wrapped as `Store` and surface as `INTERNAL_ERROR`.

use bingo_core::error::AppError;
use bingo_core::types::CardId;
use thiserror::Error;

/// Outcome of a failed card claim.
#[derive(Debug, Clone, Error)]
pub enum CardClaimError {
    /// Another request holds the card lock.
    #[error("Card {0} is being claimed by another player")]
    CardLocked(CardId),

    /// The card already has an owner.
    #[error("Card {0} is already taken")]
    CardTaken(CardId),

    /// The player has another claim in flight.
    #[error("Another card claim is in progress for this player")]
    UserBusy,

    /// The player owns the maximum number of cards.
    #[error("Card limit of {limit} reached")]
    UserLimit {
        /// Maximum cards per player.
        limit: u32,
    },

    /// The card id is malformed.
    #[error("Invalid card id: {0}")]
    InvalidCardId(String),

    /// The card id is outside the game's pool.
    #[error("Card {0} does not exist in this game")]
    CardDoesNotExist(CardId),

    /// The shared store failed.
    #[error("Store failure: {0}")]
    Store(#[from] AppError),
}

impl CardClaimError {
    /// Wire code of the rejection.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CardLocked(_) => "CARD_LOCKED",
            Self::CardTaken(_) => "CARD_TAKEN",
            Self::UserBusy => "USER_BUSY",
            Self::UserLimit { .. } => "USER_LIMIT",
            Self::InvalidCardId(_) => "INVALID_CARD_ID",
            Self::CardDoesNotExist(_) => "CARD_DOES_NOT_EXIST",
            Self::Store(_) => "INTERNAL_ERROR",
        }
    }
}

/// Outcome of a failed card release.
#[derive(Debug, Clone, Error)]
pub enum CardReleaseError {
    /// The card belongs to another player.
    #[error("Card {0} is owned by another player")]
    NotOwner(CardId),

    /// Nobody owns the card.
    #[error("Card {0} is not owned")]
    CardNotOwned(CardId),

    /// Locks stayed busy or the store kept failing.
    #[error("Releasing card {card_id} failed after {attempts} attempts")]
    RetriesExhausted {
        /// The card being released.
        card_id: CardId,
        /// Attempts made.
        attempts: u32,
    },

    /// The shared store failed with a non-transient error.
    #[error("Store failure: {0}")]
    Store(#[from] AppError),
}

impl CardReleaseError {
    /// Wire code of the rejection.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotOwner(_) => "NOT_OWNER",
            Self::CardNotOwned(_) => "CARD_NOT_OWNED",
            Self::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            Self::Store(_) => "INTERNAL_ERROR",
        }
    }
}

/// Rejection of a game session operation.
#[derive(Debug, Clone, Error)]
pub enum GameError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("No game is running in this room")]
    GameNotFound,

    #[error("The game has already started")]
    GameAlreadyStarted,

    #[error("The game has not started yet")]
    GameNotStarted,

    #[error("The game is already completed")]
    GameAlreadyCompleted,

    #[error("The game is being ended by another instance")]
    EndedByAnotherInstance,

    #[error("The game is full")]
    GameFull,

    #[error("Player is not in the game")]
    NotInGame,

    #[error("Only joined players can claim")]
    NotAPlayer,

    #[error("Select at least one card before joining")]
    NoCardsSelected,

    #[error("Card {0} is not owned by this player")]
    CardNotOwned(CardId),

    #[error("Submitted marks are missing numbers marked on the server")]
    MarkedNumbersMismatch,

    #[error("Unknown win pattern: '{0}'")]
    InvalidPattern(String),

    #[error("The card does not satisfy pattern {0}")]
    InvalidBingo(String),

    #[error("Number {0} is outside 1..=75")]
    InvalidNumber(i64),

    #[error("Entry fee payment was declined")]
    PaymentFailed,

    #[error("Payment collaborator failed: {0}")]
    Payment(AppError),

    #[error("Prize payout failed: {0}")]
    PayoutFailed(AppError),

    #[error("The game is busy, try again")]
    LockBusy,

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error(transparent)]
    Card(#[from] CardClaimError),

    #[error(transparent)]
    Release(#[from] CardReleaseError),

    #[error("Store failure: {0}")]
    Store(#[from] AppError),
}

impl GameError {
    /// Wire code of the rejection.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::GameNotFound => "GAME_NOT_FOUND",
            Self::GameAlreadyStarted => "GAME_ALREADY_STARTED",
            Self::GameNotStarted => "GAME_NOT_STARTED",
            Self::GameAlreadyCompleted => "GAME_ALREADY_COMPLETED",
            Self::EndedByAnotherInstance => "GAME_ENDED_BY_ANOTHER_INSTANCE",
            Self::GameFull => "GAME_FULL",
            Self::NotInGame => "NOT_IN_GAME",
            Self::NotAPlayer => "NOT_A_PLAYER",
            Self::NoCardsSelected => "NO_CARDS_SELECTED",
            Self::CardNotOwned(_) => "CARD_NOT_OWNED",
            Self::MarkedNumbersMismatch => "MARKED_NUMBERS_MISMATCH",
            Self::InvalidPattern(_) => "INVALID_PATTERN",
            Self::InvalidBingo(_) => "INVALID_BINGO",
            Self::InvalidNumber(_) => "INVALID_NUMBER",
            Self::PaymentFailed => "PAYMENT_FAILED",
            Self::Payment(_) => "PAYMENT_ERROR",
            Self::PayoutFailed(_) => "PAYOUT_FAILED",
            Self::LockBusy => "LOCK_BUSY",
            Self::InvalidMessage(_) => "INVALID_MESSAGE",
            Self::Card(e) => e.code(),
            Self::Release(e) => e.code(),
            Self::Store(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to the requesting player.
    pub fn public_message(&self) -> String {
        match self {
            Self::Store(_)
            | Self::Card(CardClaimError::Store(_))
            | Self::Release(CardReleaseError::Store(_)) => "Internal error, please retry".to_string(),
            Self::PayoutFailed(_) => "You won; the prize payout is delayed and will be retried".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for GameError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(AppError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_codes_pass_through() {
        let err = GameError::from(CardClaimError::CardTaken(CardId(3)));
        assert_eq!(err.code(), "CARD_TAKEN");
        let err = GameError::from(CardReleaseError::NotOwner(CardId(3)));
        assert_eq!(err.code(), "NOT_OWNER");
    }

    #[test]
    fn test_store_errors_are_internal_and_hidden() {
        let err = GameError::from(AppError::cache("connection refused to 10.0.0.3"));
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(!err.public_message().contains("10.0.0.3"));
    }

    #[test]
    fn test_payout_failure_hides_provider_detail() {
        let err = GameError::PayoutFailed(AppError::service_unavailable("wallet 10.0.0.9 down"));
        assert_eq!(err.code(), "PAYOUT_FAILED");
        assert!(!err.public_message().contains("10.0.0.9"));
    }
}
