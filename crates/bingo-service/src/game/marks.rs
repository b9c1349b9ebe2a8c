//! Per-player marks on owned cards.

use std::collections::BTreeSet;

use tracing::debug;

use bingo_core::types::card::MAX_NUMBER;
use bingo_core::types::{CardId, GameId, GameStatus, PlayerId, RoomId};

use crate::error::GameError;
use crate::game::orchestrator::GameOrchestrator;

/// A card's marks after a mark or unmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardMarks {
    /// Game the card belongs to.
    pub game_id: GameId,
    /// The marked card.
    pub card_id: CardId,
    /// Number that was marked or unmarked.
    pub number: u8,
    /// Marked set after the change.
    pub marked_numbers: BTreeSet<u8>,
}

impl GameOrchestrator {
    /// Mark `number` on an owned card.
    pub async fn mark_number(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        card_id: CardId,
        number: i64,
    ) -> Result<CardMarks, GameError> {
        self.set_mark(room_id, player_id, card_id, number, true).await
    }

    /// Unmark `number` on an owned card.
    pub async fn unmark_number(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        card_id: CardId,
        number: i64,
    ) -> Result<CardMarks, GameError> {
        self.set_mark(room_id, player_id, card_id, number, false).await
    }

    async fn set_mark(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        card_id: CardId,
        number: i64,
        marked: bool,
    ) -> Result<CardMarks, GameError> {
        let number = u8::try_from(number)
            .ok()
            .filter(|n| (1..=MAX_NUMBER).contains(n))
            .ok_or(GameError::InvalidNumber(number))?;

        let state = self.current_game(room_id).await?;
        if state.ended || state.status == GameStatus::Completed {
            return Err(GameError::GameAlreadyCompleted);
        }
        if self.cards.owner_of(state.game_id, card_id).await? != Some(player_id) {
            return Err(GameError::CardNotOwned(card_id));
        }

        let marked_numbers = self
            .cards
            .set_mark(state.game_id, player_id, card_id, number, marked)
            .await?;
        debug!(game_id = %state.game_id, player_id = %player_id, card_id = %card_id, number, marked, "Marks updated");
        Ok(CardMarks {
            game_id: state.game_id,
            card_id,
            number,
            marked_numbers,
        })
    }
}
