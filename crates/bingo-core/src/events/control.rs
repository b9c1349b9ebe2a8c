//! Engine-to-engine control signals.

use serde::{Deserialize, Serialize};

use crate::types::id::GameId;

/// Signals exchanged between instances over a game's control channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlSignal {
    /// Stop the drawing loop of `game_id`, wherever it runs.
    StopDrawing {
        /// Target game.
        game_id: GameId,
        /// Why drawing stops.
        reason: String,
    },
}

impl ControlSignal {
    /// The game this signal targets.
    pub fn game_id(&self) -> GameId {
        match self {
            Self::StopDrawing { game_id, .. } => *game_id,
        }
    }
}
