//! Shared domain types: identifiers, cards, game state, claims, and rooms.

pub mod card;
pub mod claim;
pub mod game;
pub mod id;
pub mod room;

pub use card::{CardGrid, CardId, CardInfo};
pub use claim::{ClaimOutcome, ClaimRecord, WinPattern};
pub use game::{GameState, GameStatus, WinnerInfo};
pub use id::{GameId, PlayerId, RoomId};
pub use room::{GameRecord, RoomConfig};
