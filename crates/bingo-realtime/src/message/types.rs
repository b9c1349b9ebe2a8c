//! Inbound session messages, received as `{ "type": ..., "payload": ... }`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use bingo_core::types::{CardId, PlayerId};

/// Messages a player's client sends to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    /// Ask for the current game state.
    #[serde(rename = "room.getGameStateRequest")]
    GetGameState,

    /// Claim a card.
    #[serde(rename = "card.cardSelectRequest")]
    CardSelect { card_id: CardId },

    /// Release a card.
    #[serde(rename = "card.cardReleaseRequest")]
    CardRelease { card_id: CardId },

    /// Join the game and pay the entry fee.
    #[serde(rename = "game.playerJoinRequest")]
    PlayerJoin {
        #[serde(default)]
        player_id: Option<PlayerId>,
        #[serde(default)]
        fee: Option<u64>,
        #[serde(default)]
        capacity: Option<u32>,
        #[serde(default)]
        selected_card_ids: Vec<CardId>,
    },

    /// Leave the game.
    #[serde(rename = "game.playerLeaveRequest")]
    PlayerLeave {
        #[serde(default)]
        player_id: Option<PlayerId>,
    },

    /// Mark a number on an owned card.
    #[serde(rename = "card.markNumberRequest")]
    MarkNumber { card_id: CardId, number: i64 },

    /// Unmark a number on an owned card.
    #[serde(rename = "card.unmarkNumberRequest")]
    UnmarkNumber { card_id: CardId, number: i64 },

    /// Claim a win.
    #[serde(rename = "game.bingoClaimRequest")]
    BingoClaim {
        card_id: CardId,
        marked_numbers: BTreeSet<u8>,
        pattern: String,
        #[serde(default)]
        player_name: String,
    },
}

impl InboundMessage {
    /// Wire name of the message.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::GetGameState => "room.getGameStateRequest",
            Self::CardSelect { .. } => "card.cardSelectRequest",
            Self::CardRelease { .. } => "card.cardReleaseRequest",
            Self::PlayerJoin { .. } => "game.playerJoinRequest",
            Self::PlayerLeave { .. } => "game.playerLeaveRequest",
            Self::MarkNumber { .. } => "card.markNumberRequest",
            Self::UnmarkNumber { .. } => "card.unmarkNumberRequest",
            Self::BingoClaim { .. } => "game.bingoClaimRequest",
        }
    }

    /// Player id carried in the payload, if any.
    pub fn claimed_player(&self) -> Option<PlayerId> {
        match self {
            Self::PlayerJoin { player_id, .. } | Self::PlayerLeave { player_id } => *player_id,
            _ => None,
        }
    }
}
