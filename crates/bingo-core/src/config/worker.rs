//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Maintenance worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron expression (with seconds) for the stale-game reaper.
    #[serde(default = "default_reaper_schedule")]
    pub reaper_schedule: String,
    /// How long a countdown may be overdue before the reaper completes it.
    #[serde(default = "default_countdown_grace")]
    pub countdown_grace_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reaper_schedule: default_reaper_schedule(),
            countdown_grace_seconds: default_countdown_grace(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_reaper_schedule() -> String {
    "*/30 * * * * *".to_string()
}

fn default_countdown_grace() -> u64 {
    15
}
