//! Persistence collaborators for rooms, games, and the claim audit log.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::claim::ClaimRecord;
use crate::types::id::RoomId;
use crate::types::room::{GameRecord, RoomConfig};

/// Room configuration reads and game summary writes.
#[async_trait]
pub trait RoomRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Load a room's configuration. `None` if the room does not exist.
    async fn find_room(&self, room_id: RoomId) -> AppResult<Option<RoomConfig>>;

    /// Insert or update the durable summary of a game.
    async fn upsert_game(&self, record: &GameRecord) -> AppResult<()>;
}

/// Append-only audit log of bingo claims.
#[async_trait]
pub trait ClaimRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Persist a claim record.
    async fn record(&self, claim: &ClaimRecord) -> AppResult<()>;
}
