//! Service configuration
//!
//! Loaded from a TOML file; every field has a default so a missing or
//! partial file still yields a runnable configuration. CLI flags override
//! loaded values in `main`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;
use trackdeck_common::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Socket address the HTTP API binds to
    pub bind_addr: String,

    /// Base URL of the catalog service
    pub catalog_url: String,

    /// Path of the SQLite metadata cache database
    pub cache_db: PathBuf,

    /// Event bus channel capacity
    pub event_capacity: usize,

    /// Output frame granularity for seek snapping, in milliseconds
    pub frame_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5750".to_string(),
            catalog_url: "http://127.0.0.1:5760".to_string(),
            cache_db: PathBuf::from("cache.db"),
            event_capacity: 1000,
            frame_ms: 20,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Both an unreadable and a malformed file surface as `Error::Config`
    /// naming the path.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}
