//! Process identity configuration.

use serde::{Deserialize, Serialize};

/// Identity of this engine instance among its peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Human readable service name used in logs.
    #[serde(default = "default_name")]
    pub name: String,
    /// Stable instance identifier. A random one is generated when absent.
    #[serde(default)]
    pub instance_id: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            instance_id: None,
        }
    }
}

fn default_name() -> String {
    "bingo-engine".to_string()
}
