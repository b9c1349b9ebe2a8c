//! Outbound session events, serialized as `{ "type": ..., "payload": ... }`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::card::{CardGrid, CardId};
use crate::types::game::{GameState, WinnerInfo};
use crate::types::id::{GameId, PlayerId};

/// One card owned by the viewing player, with their marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCard {
    pub card_id: CardId,
    pub grid: CardGrid,
    pub marked_numbers: BTreeSet<u8>,
}

/// The requesting player's view of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub joined: bool,
    pub cards: Vec<PlayerCard>,
}

/// Full authoritative state, sent on request or reconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub game: GameState,
    pub player: Option<PlayerView>,
}

/// Events sent to the transport layer, room-wide or to one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all_fields = "camelCase")]
pub enum OutboundEvent {
    /// Current game state.
    #[serde(rename = "room.serverGameState")]
    ServerGameState(GameSnapshot),

    /// A player joined.
    #[serde(rename = "game.playerJoined")]
    PlayerJoined {
        game_id: GameId,
        player_id: PlayerId,
        player_count: u32,
        joined_players: BTreeSet<PlayerId>,
    },

    /// A player left before the start.
    #[serde(rename = "game.playerLeft")]
    PlayerLeft {
        game_id: GameId,
        player_id: PlayerId,
        player_count: u32,
        joined_players: BTreeSet<PlayerId>,
        refunded: bool,
    },

    /// A countdown started.
    #[serde(rename = "game.countdown")]
    Countdown {
        game_id: GameId,
        countdown_end_time: DateTime<Utc>,
        seconds: u64,
    },

    /// A countdown ended with too few players; the game is READY again.
    #[serde(rename = "game.countdownAborted")]
    CountdownAborted {
        game_id: GameId,
        player_count: u32,
        min_players: u32,
    },

    /// The game moved to PLAYING.
    #[serde(rename = "game.started")]
    Started {
        game_id: GameId,
        player_count: u32,
        prize: u64,
    },

    /// A number was drawn.
    #[serde(rename = "game.numberDrawn")]
    NumberDrawn {
        game_id: GameId,
        number: u8,
        sequence: u32,
        remaining: u32,
    },

    /// A card was claimed.
    #[serde(rename = "game.cardSelected")]
    CardSelected {
        game_id: GameId,
        card_id: CardId,
        player_id: PlayerId,
    },

    /// A card was released.
    #[serde(rename = "game.cardReleased")]
    CardReleased {
        game_id: GameId,
        card_id: CardId,
        player_id: PlayerId,
    },

    /// Marked set after a mark, requester only.
    #[serde(rename = "card.markNumberResponse")]
    MarkNumberResponse {
        game_id: GameId,
        card_id: CardId,
        number: u8,
        marked_numbers: BTreeSet<u8>,
    },

    /// Marked set after an unmark, requester only.
    #[serde(rename = "card.unmarkNumberResponse")]
    UnmarkNumberResponse {
        game_id: GameId,
        card_id: CardId,
        number: u8,
        marked_numbers: BTreeSet<u8>,
    },

    /// The game completed.
    #[serde(rename = "game.ended")]
    Ended {
        game_id: GameId,
        has_winner: bool,
        result: String,
        winner: Option<WinnerInfo>,
        drawn_numbers: Vec<u8>,
    },

    /// A rejection, requester only.
    #[serde(rename = "error")]
    Error { error_type: String, message: String },
}

impl OutboundEvent {
    /// Build an error event.
    pub fn error(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Wire name of the event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServerGameState(_) => "room.serverGameState",
            Self::PlayerJoined { .. } => "game.playerJoined",
            Self::PlayerLeft { .. } => "game.playerLeft",
            Self::Countdown { .. } => "game.countdown",
            Self::CountdownAborted { .. } => "game.countdownAborted",
            Self::Started { .. } => "game.started",
            Self::NumberDrawn { .. } => "game.numberDrawn",
            Self::CardSelected { .. } => "game.cardSelected",
            Self::CardReleased { .. } => "game.cardReleased",
            Self::MarkNumberResponse { .. } => "card.markNumberResponse",
            Self::UnmarkNumberResponse { .. } => "card.unmarkNumberResponse",
            Self::Ended { .. } => "game.ended",
            Self::Error { .. } => "error",
        }
    }
}
