//! Runtime configuration consumed by the journal subsystem

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Per-mount journal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Maximum number of retained entries before the oldest is evicted
    pub retention_limit: usize,
    /// Upper bound on how long `synchronize` waits for the event source
    pub sync_timeout_ms: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            retention_limit: 10_000,
            sync_timeout_ms: 2_000,
        }
    }
}

impl JournalConfig {
    /// Parse from TOML text
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load from a TOML file on disk
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }
}
