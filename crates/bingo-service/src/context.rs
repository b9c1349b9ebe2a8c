//! Shared handles every engine service is built from.

use std::sync::Arc;

use bingo_cache::{LockCoordinator, RetryPolicy};
use bingo_core::config::GameConfig;
use bingo_core::traits::{
    ClaimRepository, PaymentGateway, PayoutGateway, RoomRepository, StateStore,
};

use crate::events::EventBus;

/// Configuration plus the store-backed primitives, cloned into each service.
#[derive(Debug, Clone)]
pub struct EngineContext {
    /// Game engine settings.
    pub config: Arc<GameConfig>,
    /// Shared state store.
    pub store: Arc<dyn StateStore>,
    /// Distributed locks over `store`.
    pub locks: LockCoordinator,
    /// Pub/sub over `store`.
    pub bus: EventBus,
    /// Backoff used by every retrying call site.
    pub retry: RetryPolicy,
}

impl EngineContext {
    /// Build the context over `store`.
    pub fn new(config: GameConfig, store: Arc<dyn StateStore>) -> Self {
        let retry = RetryPolicy::from_config(&config.locks.retry);
        Self {
            locks: LockCoordinator::new(Arc::clone(&store)),
            bus: EventBus::new(Arc::clone(&store)),
            config: Arc::new(config),
            store,
            retry,
        }
    }
}

/// External collaborators the engine calls into.
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Room configuration and game summaries.
    pub rooms: Arc<dyn RoomRepository>,
    /// Claim audit log.
    pub claims: Arc<dyn ClaimRepository>,
    /// Entry fee charges and refunds.
    pub payments: Arc<dyn PaymentGateway>,
    /// Winner payouts.
    pub payouts: Arc<dyn PayoutGateway>,
}
