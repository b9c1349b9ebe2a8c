//! Bingo engine server.
//!
//! Wires configuration, logging, the shared state store, the optional
//! PostgreSQL adapters, the game engine, and the maintenance worker, then
//! runs until Ctrl-C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use bingo_cache::StoreManager;
use bingo_core::config::AppConfig;
use bingo_core::error::AppError;
use bingo_database::{DatabasePool, PgClaimRepository, PgRoomRepository, PgWallet};
use bingo_service::testing::MemoryCollaborators;
use bingo_service::{Collaborators, EngineContext, GameOrchestrator};
use bingo_worker::{GameReaper, MaintenanceScheduler};

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "bingo-server", version, about = "Distributed bingo game engine")]
struct Args {
    /// Directory holding `default.toml` and the environment overlays.
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Environment overlay to load; falls back to `BINGO_ENV`, then `development`.
    #[arg(long)]
    env: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let env = args
        .env
        .or_else(|| std::env::var("BINGO_ENV").ok())
        .unwrap_or_else(|| "development".to_string());

    let config = match AppConfig::load(&args.config_dir, &env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(config_dir = %args.config_dir, env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    let instance = config
        .server
        .instance_id
        .clone()
        .unwrap_or_else(|| uuid_suffix(&uuid::Uuid::new_v4()));
    tracing::info!(
        service = %config.server.name,
        instance = %instance,
        "Starting bingo engine v{}",
        env!("CARGO_PKG_VERSION")
    );

    // ── Shared state store ───────────────────────────────────────
    let store = StoreManager::new(&config.cache).await?;
    let store = store.store();
    if !store.health_check().await? {
        return Err(AppError::service_unavailable("State store health check failed"));
    }
    tracing::info!(provider = %config.cache.provider, "State store ready");

    // ── Persistence collaborators ────────────────────────────────
    let (collaborators, database) = if config.database.is_enabled() {
        let database = DatabasePool::connect(&config.database).await?;
        database.migrate().await?;
        let pool = database.pool().clone();
        let wallet = Arc::new(PgWallet::new(pool.clone()));
        let collaborators = Collaborators {
            rooms: Arc::new(PgRoomRepository::new(pool.clone())),
            claims: Arc::new(PgClaimRepository::new(pool)),
            payments: wallet.clone(),
            payouts: wallet,
        };
        (collaborators, Some(database))
    } else {
        tracing::warn!("database.url is not set, using in-memory collaborators");
        (MemoryCollaborators::default().collaborators(), None)
    };

    // ── Engine ───────────────────────────────────────────────────
    let ctx = EngineContext::new(config.game.clone(), store);
    let orchestrator = GameOrchestrator::new(ctx, collaborators);
    tracing::info!(
        draw_interval_ms = config.game.draw_interval_ms,
        countdown_seconds = config.game.countdown_seconds,
        "Game engine ready"
    );

    // ── Maintenance worker ───────────────────────────────────────
    let scheduler = if config.worker.enabled {
        let reaper = GameReaper::new(
            orchestrator.clone(),
            Duration::from_secs(config.worker.countdown_grace_seconds),
        );
        let scheduler = MaintenanceScheduler::new().await?;
        scheduler
            .register_reaper(reaper, &config.worker.reaper_schedule)
            .await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Maintenance worker disabled");
        None
    };

    shutdown_signal().await?;
    tracing::info!("Shutdown signal received");

    if let Some(mut scheduler) = scheduler {
        scheduler.shutdown().await?;
    }
    if let Some(database) = database {
        database.close().await;
    }

    tracing::info!("Bingo engine shut down");
    Ok(())
}

fn uuid_suffix(id: &uuid::Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() -> Result<(), AppError> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .map_err(|e| AppError::internal(format!("Failed to install SIGTERM handler: {e}")))?;
        tokio::select! {
            result = ctrl_c => result
                .map_err(|e| AppError::internal(format!("Failed to listen for Ctrl+C: {e}"))),
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    ctrl_c
        .await
        .map_err(|e| AppError::internal(format!("Failed to listen for Ctrl+C: {e}")))
}
