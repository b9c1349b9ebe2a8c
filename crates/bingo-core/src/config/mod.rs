//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every field carries a serde default so an empty file is valid.

pub mod app;
pub mod cache;
pub mod database;
pub mod game;
pub mod logging;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::app::ServerConfig;
pub use self::cache::{CacheConfig, MemoryCacheConfig, RedisCacheConfig};
pub use self::database::DatabaseConfig;
pub use self::game::{GameConfig, LockConfig, RetryConfig};
pub use self::logging::LoggingConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// files (default.toml + environment overlay + `BINGO__*` variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Process identity settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Relational store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Shared state store settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Game engine timing, limits, and lock settings.
    #[serde(default)]
    pub game: GameConfig,
    /// Background worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files in `dir`.
    ///
    /// Merges `{dir}/default` with the environment-specific overlay
    /// `{dir}/{env}` and environment variables prefixed with `BINGO__`.
    pub fn load(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("BINGO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.cache.provider, "memory");
        assert_eq!(config.game.draw_interval_ms, 5_000);
        assert_eq!(config.game.countdown_seconds, 20);
        assert_eq!(config.game.locks.drawing_ttl_ms, 250_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_section_override() {
        let config: AppConfig =
            serde_json::from_str(r#"{"game": {"min_players": 3, "locks": {"claim_ttl_ms": 2000}}}"#)
                .unwrap();
        assert_eq!(config.game.min_players, 3);
        assert_eq!(config.game.locks.claim_ttl_ms, 2_000);
        assert_eq!(config.game.locks.end_ttl_ms, 30_000);
    }
}
