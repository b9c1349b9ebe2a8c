//! Shared test helpers for integration tests.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use bingo_cache::memory::MemoryStateStore;
use bingo_core::config::GameConfig;
use bingo_core::config::cache::MemoryCacheConfig;
use bingo_core::types::{CardId, GameState, GameStatus, PlayerId, RoomConfig, RoomId};
use bingo_service::testing::MemoryCollaborators;
use bingo_service::{EngineContext, GameError, GameOrchestrator, JoinOutcome, JoinRequest};
use tokio::task::JoinHandle;

/// Entry fee of every test room.
pub const ENTRY_FEE: u64 = 10;

/// One engine instance over a fresh in-memory store.
pub struct TestEngine {
    pub orchestrator: GameOrchestrator,
    pub fakes: MemoryCollaborators,
    pub room_id: RoomId,
}

/// Timings small enough for paused-clock tests.
pub fn fast_config() -> GameConfig {
    GameConfig {
        draw_interval_ms: 10,
        countdown_seconds: 1,
        no_winner_grace_ms: 50,
        post_game_retention_seconds: 3_600,
        ..GameConfig::default()
    }
}

impl TestEngine {
    /// Engine hosting one room that needs `min_players` to start.
    pub async fn new(config: GameConfig, min_players: u32) -> Self {
        let store = Arc::new(MemoryStateStore::new(&MemoryCacheConfig::default()));
        let ctx = EngineContext::new(config, store);
        let fakes = MemoryCollaborators::default();
        let room_id = RoomId::new();
        fakes
            .rooms
            .insert_room(RoomConfig {
                room_id,
                name: "Integration".to_string(),
                min_players,
                capacity: 10,
                entry_fee: ENTRY_FEE,
                commission_rate: 0.1,
            })
            .await;
        let orchestrator = GameOrchestrator::new(ctx, fakes.collaborators());
        Self {
            orchestrator,
            fakes,
            room_id,
        }
    }

    /// Current game of the room.
    pub async fn game(&self) -> GameState {
        self.orchestrator
            .current_game(self.room_id)
            .await
            .expect("room has a game")
    }

    /// Select `card` and join with it.
    pub async fn seat(&self, player_id: PlayerId, card: u32) -> JoinOutcome {
        self.orchestrator
            .select_card(self.room_id, player_id, CardId(card))
            .await
            .expect("card selected");
        self.orchestrator
            .join(self.room_id, JoinRequest::new(player_id))
            .await
            .expect("player joined")
    }

    /// Select `card`, then run the join in the background.
    pub async fn spawn_join(
        &self,
        player_id: PlayerId,
        card: u32,
    ) -> JoinHandle<Result<JoinOutcome, GameError>> {
        self.orchestrator
            .select_card(self.room_id, player_id, CardId(card))
            .await
            .expect("card selected");
        let orchestrator = self.orchestrator.clone();
        let room_id = self.room_id;
        tokio::spawn(async move { orchestrator.join(room_id, JoinRequest::new(player_id)).await })
    }

    /// Whether the player holds a seat whose join is still in flight.
    pub async fn is_pending(&self, player_id: PlayerId) -> bool {
        let game_id = self.game().await.game_id;
        self.orchestrator
            .games()
            .is_pending(game_id, player_id)
            .await
            .expect("pending seats readable")
    }

    /// Wait until the player's join reserved its seat.
    pub async fn wait_pending(&self, player_id: PlayerId) {
        for _ in 0..200 {
            if self.is_pending(player_id).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("seat never reserved");
    }

    /// Every non-free number of the player's first card.
    pub async fn card_numbers(&self, player_id: PlayerId) -> (CardId, BTreeSet<u8>) {
        let snapshot = self
            .orchestrator
            .get_state(self.room_id, Some(player_id))
            .await
            .expect("snapshot");
        let card = snapshot
            .player
            .and_then(|p| p.cards.into_iter().next())
            .expect("player owns a card");
        (card.card_id, card.grid.numbers().collect())
    }

    /// Advance the paused clock until `done` holds, polling every 100 ms.
    pub async fn wait_until<F>(&self, mut done: F) -> GameState
    where
        F: FnMut(&GameState) -> bool,
    {
        for _ in 0..200 {
            let state = self.game().await;
            if done(&state) {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("condition not reached");
    }

    /// Wait until the game reaches `status`.
    pub async fn wait_for_status(&self, status: GameStatus) -> GameState {
        self.wait_until(|state| state.status == status).await
    }
}
