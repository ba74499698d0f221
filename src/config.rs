use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Engine settings.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Longest wait for a path lock before giving up with `LockTimeout`.
    pub lock_timeout_ms: u64,
    /// Pause between lock attempts.
    pub lock_poll_ms: u64,
    /// Appended to a WDM path to name its lock file.
    pub lock_suffix: String,
    /// JSON attribute catalog replacing the built-in one.
    pub catalog_path: Option<PathBuf>,
    /// Fill value used for data sets that carry no TSFILL attribute.
    pub default_fill: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            lock_timeout_ms: 30_000,
            lock_poll_ms: 50,
            lock_suffix: ".lock".to_string(),
            catalog_path: None,
            default_fill: -999.0,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Defaults overlaid with `WDM_LOCK_TIMEOUT_MS` and `WDM_CATALOG`.
    pub fn from_env() -> Self {
        let mut config = EngineConfig::default();
        if let Some(ms) = std::env::var("WDM_LOCK_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            config.lock_timeout_ms = ms;
        }
        if let Some(path) = std::env::var_os("WDM_CATALOG").filter(|p| !p.is_empty()) {
            config.catalog_path = Some(PathBuf::from(path));
        }
        config
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn lock_poll(&self) -> Duration {
        Duration::from_millis(self.lock_poll_ms.max(1))
    }
}
