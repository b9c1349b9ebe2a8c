//! Event bus over the shared store's pub/sub.
//!
//! Delivery is best effort: no acknowledgment and no replay. Consumers
//! recover from missed messages by re-querying the game state.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{error, warn};

use bingo_cache::keys::channels;
use bingo_core::events::{ControlSignal, OutboundEvent};
use bingo_core::result::AppResult;
use bingo_core::traits::StateStore;
use bingo_core::types::{GameId, PlayerId, RoomId};

/// Decoded outbound events of one channel.
pub type EventStream = BoxStream<'static, OutboundEvent>;

/// Decoded control signals of one game.
pub type ControlStream = BoxStream<'static, ControlSignal>;

/// Publishes envelopes on room, player, and game-control channels.
#[derive(Debug, Clone)]
pub struct EventBus {
    store: Arc<dyn StateStore>,
}

impl EventBus {
    /// Create a bus over `store`.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Publish an event to every player of a room.
    pub async fn publish_room(&self, room_id: RoomId, event: &OutboundEvent) -> AppResult<()> {
        let payload = serde_json::to_string(event)?;
        self.store.publish(&channels::room(room_id), &payload).await
    }

    /// Publish an event to one player.
    pub async fn publish_player(&self, player_id: PlayerId, event: &OutboundEvent) -> AppResult<()> {
        let payload = serde_json::to_string(event)?;
        self.store.publish(&channels::player(player_id), &payload).await
    }

    /// Publish a control signal for a game.
    pub async fn publish_control(&self, signal: &ControlSignal) -> AppResult<()> {
        let payload = serde_json::to_string(signal)?;
        self.store
            .publish(&channels::control(signal.game_id()), &payload)
            .await
    }

    /// Publish to a room, logging failures instead of returning them.
    pub async fn broadcast(&self, room_id: RoomId, event: OutboundEvent) {
        if let Err(e) = self.publish_room(room_id, &event).await {
            error!(room_id = %room_id, event = event.event_type(), error = %e, "Failed to broadcast event");
        }
    }

    /// Publish to one player, logging failures instead of returning them.
    pub async fn notify(&self, player_id: PlayerId, event: OutboundEvent) {
        if let Err(e) = self.publish_player(player_id, &event).await {
            error!(player_id = %player_id, event = event.event_type(), error = %e, "Failed to notify player");
        }
    }

    /// Subscribe to a room's events.
    pub async fn subscribe_room(&self, room_id: RoomId) -> AppResult<EventStream> {
        self.subscribe_events(channels::room(room_id)).await
    }

    /// Subscribe to one player's events.
    pub async fn subscribe_player(&self, player_id: PlayerId) -> AppResult<EventStream> {
        self.subscribe_events(channels::player(player_id)).await
    }

    /// Subscribe to a game's control signals.
    pub async fn subscribe_control(&self, game_id: GameId) -> AppResult<ControlStream> {
        let channel = channels::control(game_id);
        let raw = self.store.subscribe(&channel).await?;
        Ok(raw
            .filter_map(move |payload| {
                let decoded = match serde_json::from_str::<ControlSignal>(&payload) {
                    Ok(signal) => Some(signal),
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Dropping undecodable control signal");
                        None
                    }
                };
                futures::future::ready(decoded)
            })
            .boxed())
    }

    async fn subscribe_events(&self, channel: String) -> AppResult<EventStream> {
        let raw = self.store.subscribe(&channel).await?;
        Ok(raw
            .filter_map(move |payload| {
                let decoded = match serde_json::from_str::<OutboundEvent>(&payload) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Dropping undecodable event");
                        None
                    }
                };
                futures::future::ready(decoded)
            })
            .boxed())
    }
}
