//! Card pool generation and snapshot storage.
//!
//! A game's pool is generated once at initialization, written to the shared
//! store as one JSON snapshot, and never changes afterwards. Snapshots are
//! also held in a bounded process-local cache keyed by game id.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use bingo_cache::keys;
use bingo_core::result::AppResult;
use bingo_core::types::card::{CardGrid, CardId, CardInfo, GRID_SIZE};
use bingo_core::types::GameId;

use crate::context::EngineContext;

/// Number of pool snapshots kept in the process-local cache.
const CACHED_POOLS: u64 = 1_024;

/// Generate one random, well-formed card.
pub fn generate_card<R: Rng + ?Sized>(rng: &mut R) -> CardGrid {
    let mut columns = [[0u8; GRID_SIZE]; GRID_SIZE];
    for (col, column) in columns.iter_mut().enumerate() {
        let mut numbers: Vec<u8> = CardGrid::column_range(col).collect();
        numbers.shuffle(rng);
        column.copy_from_slice(&numbers[..GRID_SIZE]);
    }
    CardGrid::from_columns(columns)
}

/// Generate `size` distinct cards with ids `1..=size`.
pub fn generate_pool(size: u32) -> Vec<CardInfo> {
    let mut rng = rand::rng();
    let mut seen = HashSet::with_capacity(size as usize);
    let mut cards = Vec::with_capacity(size as usize);
    while cards.len() < size as usize {
        let grid = generate_card(&mut rng);
        if seen.insert(grid.clone()) {
            cards.push(CardInfo {
                card_id: CardId(cards.len() as u32 + 1),
                grid,
            });
        }
    }
    cards
}

/// Stores and serves immutable card-pool snapshots.
#[derive(Debug, Clone)]
pub struct CardPoolStore {
    ctx: EngineContext,
    cache: Cache<GameId, Arc<Vec<CardInfo>>>,
}

impl CardPoolStore {
    /// Create a pool store.
    pub fn new(ctx: EngineContext) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHED_POOLS)
            .time_to_live(Duration::from_secs(ctx.config.state_ttl_seconds.max(1)))
            .build();
        Self { ctx, cache }
    }

    /// Generate and persist the pool of a new game.
    pub async fn create(&self, game_id: GameId) -> AppResult<Arc<Vec<CardInfo>>> {
        let size = self.ctx.config.card_pool_size.max(1);
        let cards = generate_pool(size);
        let snapshot = serde_json::to_string(&cards)?;
        self.ctx
            .store
            .set(&keys::card_pool(game_id), &snapshot, self.ctx.config.state_ttl())
            .await?;

        let cards = Arc::new(cards);
        self.cache.insert(game_id, Arc::clone(&cards)).await;
        info!(game_id = %game_id, size, "Card pool generated");
        Ok(cards)
    }

    /// Load a game's pool. `None` if the snapshot is gone.
    pub async fn load(&self, game_id: GameId) -> AppResult<Option<Arc<Vec<CardInfo>>>> {
        if let Some(cards) = self.cache.get(&game_id).await {
            return Ok(Some(cards));
        }
        let Some(snapshot) = self.ctx.store.get(&keys::card_pool(game_id)).await? else {
            return Ok(None);
        };
        let cards: Arc<Vec<CardInfo>> = Arc::new(serde_json::from_str(&snapshot)?);
        self.cache.insert(game_id, Arc::clone(&cards)).await;
        debug!(game_id = %game_id, "Card pool loaded from store");
        Ok(Some(cards))
    }

    /// Look up one card of a game's pool.
    pub async fn card(&self, game_id: GameId, card_id: CardId) -> AppResult<Option<CardInfo>> {
        let Some(cards) = self.load(game_id).await? else {
            return Ok(None);
        };
        Ok(cards.iter().find(|c| c.card_id == card_id).cloned())
    }

    /// Drop a game's pool from the process-local cache.
    pub async fn evict(&self, game_id: GameId) {
        self.cache.invalidate(&game_id).await;
    }
}
