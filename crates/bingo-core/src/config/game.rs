//! Game engine configuration: timing, limits, lock TTLs, and retry policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Game engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Interval between two drawn numbers, in milliseconds.
    #[serde(default = "default_draw_interval")]
    pub draw_interval_ms: u64,
    /// Countdown length before a round starts, in seconds.
    #[serde(default = "default_countdown")]
    pub countdown_seconds: u64,
    /// Minimum players needed to start, used when a room does not set one.
    #[serde(default = "default_min_players")]
    pub min_players: u32,
    /// Maximum number of cards one player may own in a game.
    #[serde(default = "default_max_cards")]
    pub max_cards_per_player: u32,
    /// Number of cards generated for each game's pool.
    #[serde(default = "default_pool_size")]
    pub card_pool_size: u32,
    /// Wait after the last number before declaring "no winner", in milliseconds.
    #[serde(default = "default_no_winner_grace")]
    pub no_winner_grace_ms: u64,
    /// A PLAYING/COUNTDOWN game with no update for this long is stale.
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: u64,
    /// Absolute expiry applied to every game-scoped key.
    #[serde(default = "default_state_ttl")]
    pub state_ttl_seconds: u64,
    /// How long a COMPLETED game stays readable before its keys are purged.
    #[serde(default = "default_retention")]
    pub post_game_retention_seconds: u64,
    /// Attempts made by card release on transient store failures.
    #[serde(default = "default_release_attempts")]
    pub release_attempts: u32,
    /// Lock TTLs and the bounded retry policy.
    #[serde(default)]
    pub locks: LockConfig,
}

impl GameConfig {
    /// Draw tick interval.
    pub fn draw_interval(&self) -> Duration {
        Duration::from_millis(self.draw_interval_ms)
    }

    /// Countdown duration.
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_seconds)
    }

    /// Grace window before a no-winner finalization.
    pub fn no_winner_grace(&self) -> Duration {
        Duration::from_millis(self.no_winner_grace_ms)
    }

    /// Staleness window.
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_seconds)
    }

    /// Absolute TTL of game-scoped keys.
    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_seconds)
    }

    /// Retention of a completed game before purge.
    pub fn post_game_retention(&self) -> Duration {
        Duration::from_secs(self.post_game_retention_seconds)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            draw_interval_ms: default_draw_interval(),
            countdown_seconds: default_countdown(),
            min_players: default_min_players(),
            max_cards_per_player: default_max_cards(),
            card_pool_size: default_pool_size(),
            no_winner_grace_ms: default_no_winner_grace(),
            stale_after_seconds: default_stale_after(),
            state_ttl_seconds: default_state_ttl(),
            post_game_retention_seconds: default_retention(),
            release_attempts: default_release_attempts(),
            locks: LockConfig::default(),
        }
    }
}

/// TTL per lock family, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Per-room game initialization lock.
    #[serde(default = "default_init_ttl")]
    pub init_ttl_ms: u64,
    /// Per-game state mutation lock.
    #[serde(default = "default_state_lock_ttl")]
    pub state_ttl_ms: u64,
    /// Per-game drawing ownership lock.
    #[serde(default = "default_drawing_ttl")]
    pub drawing_ttl_ms: u64,
    /// Per-game countdown lock.
    #[serde(default = "default_countdown_ttl")]
    pub countdown_ttl_ms: u64,
    /// Per-card claim lock.
    #[serde(default = "default_card_ttl")]
    pub card_ttl_ms: u64,
    /// Per-player claim lock.
    #[serde(default = "default_user_ttl")]
    pub user_ttl_ms: u64,
    /// Per-game bingo claim lock.
    #[serde(default = "default_claim_ttl")]
    pub claim_ttl_ms: u64,
    /// Per-game end-finalization lock.
    #[serde(default = "default_end_ttl")]
    pub end_ttl_ms: u64,
    /// Bounded retry policy for lock acquisition.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl LockConfig {
    /// Game initialization lock TTL.
    pub fn init_ttl(&self) -> Duration {
        Duration::from_millis(self.init_ttl_ms)
    }

    /// State mutation lock TTL.
    pub fn state_ttl(&self) -> Duration {
        Duration::from_millis(self.state_ttl_ms)
    }

    /// Drawing ownership lock TTL.
    pub fn drawing_ttl(&self) -> Duration {
        Duration::from_millis(self.drawing_ttl_ms)
    }

    /// Countdown lock TTL.
    pub fn countdown_ttl(&self) -> Duration {
        Duration::from_millis(self.countdown_ttl_ms)
    }

    /// Card lock TTL.
    pub fn card_ttl(&self) -> Duration {
        Duration::from_millis(self.card_ttl_ms)
    }

    /// Player lock TTL.
    pub fn user_ttl(&self) -> Duration {
        Duration::from_millis(self.user_ttl_ms)
    }

    /// Bingo claim lock TTL.
    pub fn claim_ttl(&self) -> Duration {
        Duration::from_millis(self.claim_ttl_ms)
    }

    /// End-finalization lock TTL.
    pub fn end_ttl(&self) -> Duration {
        Duration::from_millis(self.end_ttl_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            init_ttl_ms: default_init_ttl(),
            state_ttl_ms: default_state_lock_ttl(),
            drawing_ttl_ms: default_drawing_ttl(),
            countdown_ttl_ms: default_countdown_ttl(),
            card_ttl_ms: default_card_ttl(),
            user_ttl_ms: default_user_ttl(),
            claim_ttl_ms: default_claim_ttl(),
            end_ttl_ms: default_end_ttl(),
            retry: RetryConfig::default(),
        }
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    /// Upper bound of a single delay, in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_draw_interval() -> u64 {
    5_000
}

fn default_countdown() -> u64 {
    20
}

fn default_min_players() -> u32 {
    2
}

fn default_max_cards() -> u32 {
    2
}

fn default_pool_size() -> u32 {
    100
}

fn default_no_winner_grace() -> u64 {
    5_000
}

fn default_stale_after() -> u64 {
    600
}

fn default_state_ttl() -> u64 {
    86_400
}

fn default_retention() -> u64 {
    30
}

fn default_release_attempts() -> u32 {
    3
}

fn default_init_ttl() -> u64 {
    10_000
}

fn default_state_lock_ttl() -> u64 {
    5_000
}

fn default_drawing_ttl() -> u64 {
    250_000
}

fn default_countdown_ttl() -> u64 {
    30_000
}

fn default_card_ttl() -> u64 {
    5_000
}

fn default_user_ttl() -> u64 {
    5_000
}

fn default_claim_ttl() -> u64 {
    10_000
}

fn default_end_ttl() -> u64 {
    30_000
}

fn default_attempts() -> u32 {
    5
}

fn default_base_delay() -> u64 {
    50
}

fn default_max_delay() -> u64 {
    1_000
}
