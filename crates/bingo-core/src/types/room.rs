//! Room configuration and the durable game summary row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::game::{GameState, GameStatus};
use super::id::{GameId, PlayerId, RoomId};

/// Configuration of a room, read from the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    /// Room identifier.
    pub room_id: RoomId,
    /// Display name.
    pub name: String,
    /// Players needed to start a countdown.
    pub min_players: u32,
    /// Maximum players; `0` means unlimited.
    pub capacity: u32,
    /// Entry fee in currency units.
    pub entry_fee: u64,
    /// House commission in `[0, 1]`.
    pub commission_rate: f64,
}

/// Durable summary of one game, written through the room repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub game_id: GameId,
    pub room_id: RoomId,
    pub status: GameStatus,
    pub player_count: u32,
    pub pot: u64,
    pub prize: u64,
    pub winner_id: Option<PlayerId>,
    pub drawn_count: u32,
    pub payout_pending: bool,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl GameRecord {
    /// Summarize the current state of a game.
    pub fn from_state(state: &GameState) -> Self {
        let ended_at = state.status.is_terminal().then_some(state.status_updated_at);
        Self {
            game_id: state.game_id,
            room_id: state.room_id,
            status: state.status,
            player_count: state.player_count(),
            pot: state.pot(),
            prize: state.winner.as_ref().map(|w| w.prize).unwrap_or(0),
            winner_id: state.winner.as_ref().map(|w| w.player_id),
            drawn_count: state.drawn_numbers.len() as u32,
            payout_pending: state.payout_pending,
            created_at: state.created_at,
            ended_at,
        }
    }
}
