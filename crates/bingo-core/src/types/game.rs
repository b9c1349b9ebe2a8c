//! Game lifecycle status and the canonical per-room game state.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::card::{CardId, MAX_NUMBER};
use super::claim::WinPattern;
use super::id::{GameId, PlayerId, RoomId};
use super::room::RoomConfig;

/// Lifecycle status of a game.
///
/// Transitions only `Ready → Countdown → Playing → Completed`, or
/// `Countdown → Ready` when a countdown ends with too few players.
/// `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    /// Waiting for players.
    Ready,
    /// Countdown running towards the start.
    Countdown,
    /// Numbers are being drawn.
    Playing,
    /// Finished, with or without a winner.
    Completed,
}

impl GameStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Countdown => "COUNTDOWN",
            Self::Playing => "PLAYING",
            Self::Completed => "COMPLETED",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: GameStatus) -> bool {
        matches!(
            (self, next),
            (Self::Ready, Self::Countdown)
                | (Self::Countdown, Self::Playing)
                | (Self::Countdown, Self::Ready)
                | (Self::Playing, Self::Completed)
        )
    }

    /// Whether the game is counting down or playing.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Countdown | Self::Playing)
    }

    /// Whether the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(Self::Ready),
            "COUNTDOWN" => Ok(Self::Countdown),
            "PLAYING" => Ok(Self::Playing),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(format!("Unknown game status: '{other}'")),
        }
    }
}

/// Who won a game and what they were paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerInfo {
    /// The winning player.
    pub player_id: PlayerId,
    /// Display name supplied with the claim.
    pub player_name: String,
    /// The winning card.
    pub card_id: CardId,
    /// The pattern that won.
    pub pattern: WinPattern,
    /// Prize handed to the payout collaborator.
    pub prize: u64,
}

/// Canonical state of the active game of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Game identifier.
    pub game_id: GameId,
    /// Hosting room.
    pub room_id: RoomId,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Set once the game moves to PLAYING.
    pub started: bool,
    /// Set once the game is finalized.
    pub ended: bool,
    /// Asks the drawing loop to stop at its next tick.
    pub stop_number_drawing: bool,
    /// Absolute end of the running countdown.
    pub countdown_end_time: Option<DateTime<Utc>>,
    /// Drawn numbers in draw order.
    pub drawn_numbers: Vec<u8>,
    /// Players who joined (and paid).
    pub joined_players: BTreeSet<PlayerId>,
    /// Every card id of this game's pool.
    pub all_card_ids: Vec<CardId>,
    /// Cards currently owned by some player.
    pub selected_card_ids: BTreeSet<CardId>,
    /// Maximum number of players.
    pub capacity: u32,
    /// Minimum number of players to start.
    pub min_players: u32,
    /// Entry fee charged once per player.
    pub entry_fee: u64,
    /// House commission in `[0, 1]`.
    pub commission_rate: f64,
    /// When the game was created.
    pub created_at: DateTime<Utc>,
    /// Last time any field changed.
    pub status_updated_at: DateTime<Utc>,
    /// Winner, once the game completed with one.
    pub winner: Option<WinnerInfo>,
    /// The winner's prize has not been paid out yet.
    #[serde(default)]
    pub payout_pending: bool,
}

impl GameState {
    /// Create a READY game for `room` with a pool of `card_count` cards.
    pub fn new(game_id: GameId, room: &RoomConfig, card_count: u32, now: DateTime<Utc>) -> Self {
        Self {
            game_id,
            room_id: room.room_id,
            status: GameStatus::Ready,
            started: false,
            ended: false,
            stop_number_drawing: false,
            countdown_end_time: None,
            drawn_numbers: Vec::new(),
            joined_players: BTreeSet::new(),
            all_card_ids: (1..=card_count).map(CardId).collect(),
            selected_card_ids: BTreeSet::new(),
            capacity: room.capacity,
            min_players: room.min_players,
            entry_fee: room.entry_fee,
            commission_rate: room.commission_rate,
            created_at: now,
            status_updated_at: now,
            winner: None,
            payout_pending: false,
        }
    }

    /// Number of joined players.
    pub fn player_count(&self) -> u32 {
        self.joined_players.len() as u32
    }

    /// Whether `player` joined this game.
    pub fn is_member(&self, player: &PlayerId) -> bool {
        self.joined_players.contains(player)
    }

    /// Whether enough players joined to start.
    pub fn has_enough_players(&self) -> bool {
        self.player_count() >= self.min_players.max(1)
    }

    /// Whether the game has room for one more player next to `pending`
    /// seats reserved by joins still being charged.
    pub fn has_capacity(&self, pending: u32) -> bool {
        self.capacity == 0 || self.player_count().saturating_add(pending) < self.capacity
    }

    /// Whether `card_id` belongs to this game's pool.
    pub fn has_card(&self, card_id: CardId) -> bool {
        card_id.0 >= 1 && (card_id.0 as usize) <= self.all_card_ids.len()
    }

    /// Total collected entry fees.
    pub fn pot(&self) -> u64 {
        self.entry_fee.saturating_mul(self.player_count() as u64)
    }

    /// Pot minus the house commission, rounded down.
    pub fn prize(&self) -> u64 {
        let rate = self.commission_rate.clamp(0.0, 1.0);
        (self.pot() as f64 * (1.0 - rate)).floor() as u64
    }

    /// Numbers in `1..=75` not drawn yet, ascending.
    pub fn undrawn_numbers(&self) -> Vec<u8> {
        let drawn: BTreeSet<u8> = self.drawn_numbers.iter().copied().collect();
        (1..=MAX_NUMBER).filter(|n| !drawn.contains(n)).collect()
    }

    /// Whether numbers should still be drawn for this game.
    pub fn is_drawing(&self) -> bool {
        self.status == GameStatus::Playing && !self.ended && !self.stop_number_drawing
    }

    /// Whether an active game went without any update for longer than `window`.
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        if !self.status.is_active() {
            return false;
        }
        let elapsed = now.signed_duration_since(self.status_updated_at);
        elapsed.to_std().map(|e| e > window).unwrap_or(false)
    }

    /// Whether the game can be replaced by a fresh one.
    pub fn is_replaceable(&self, now: DateTime<Utc>, stale_window: Duration) -> bool {
        self.status.is_terminal() || self.ended || self.is_stale(now, stale_window)
    }
}
