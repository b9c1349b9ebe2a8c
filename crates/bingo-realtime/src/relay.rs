//! One outbound stream per connected player.

use futures::stream;
use futures::StreamExt;
use tracing::debug;

use bingo_core::result::AppResult;
use bingo_core::types::{PlayerId, RoomId};
use bingo_service::events::{EventBus, EventStream};

/// Merges a room's broadcast channel with a player's personal channel.
#[derive(Debug, Clone)]
pub struct SessionRelay {
    bus: EventBus,
}

impl SessionRelay {
    /// Create a relay over `bus`.
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Subscribe to everything `player_id` should see in `room_id`.
    ///
    /// Events are yielded in arrival order per channel; there is no ordering
    /// across the two channels and no replay of earlier events.
    pub async fn open(&self, room_id: RoomId, player_id: PlayerId) -> AppResult<EventStream> {
        let room = self.bus.subscribe_room(room_id).await?;
        let player = self.bus.subscribe_player(player_id).await?;
        debug!(room_id = %room_id, player_id = %player_id, "Session relay opened");
        Ok(stream::select(room, player).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bingo_cache::memory::MemoryStateStore;
    use bingo_core::config::cache::MemoryCacheConfig;
    use bingo_core::events::OutboundEvent;

    #[tokio::test]
    async fn test_relay_merges_room_and_player_channels() {
        let bus = EventBus::new(Arc::new(MemoryStateStore::new(&MemoryCacheConfig::default())));
        let relay = SessionRelay::new(bus.clone());
        let room = RoomId::new();
        let player = PlayerId::new();
        let mut events = relay.open(room, player).await.unwrap();

        bus.broadcast(room, OutboundEvent::error("ROOM", "")).await;
        bus.notify(player, OutboundEvent::error("PLAYER", "")).await;
        bus.notify(PlayerId::new(), OutboundEvent::error("OTHER", "")).await;

        let mut seen = Vec::new();
        for _ in 0..2 {
            if let Some(OutboundEvent::Error { error_type, .. }) = events.next().await {
                seen.push(error_type);
            }
        }
        seen.sort();
        assert_eq!(seen, vec!["PLAYER".to_string(), "ROOM".to_string()]);
    }
}
