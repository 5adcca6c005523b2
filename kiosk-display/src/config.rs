//! kiosk-display configuration
//!
//! Compiled defaults, overridden by `display.toml`, overridden by command-line
//! arguments / `KIOSK_*` environment variables (applied in `main.rs`).

use crate::error::{Error, Result};
use kiosk_common::locator::MediaLocator;
use kiosk_common::protocol::MAX_ASSET_ID;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Config file name looked up under the platform config dir
pub const CONFIG_FILE_NAME: &str = "display.toml";

/// Display client configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Controller WebSocket endpoint
    pub controller_url: String,
    /// Base URL that hosts `<id3>.jpg` / `<id3>.mp3`
    pub media_base_url: String,
    /// Number of assets in the catalog (ids `1..=catalog_size`)
    pub catalog_size: u16,
    /// Maximum concurrent image+audio fetch pairs during preload
    pub max_concurrent_fetches: usize,
    /// How long preload waits for audio to finish buffering
    pub audio_timeout_ms: u64,
    /// Delay before reconnecting a dropped control channel
    pub reconnect_interval_ms: u64,
    /// Playout progress tick
    pub progress_interval_ms: u64,
    /// Per-request HTTP timeout
    pub http_timeout_ms: u64,
    /// Open the playback permission gate at startup without operator input
    pub auto_unlock: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            controller_url: "ws://localhost:8080/ws".to_string(),
            media_base_url: "http://localhost:8080/media".to_string(),
            // Prototype panel; the full panel carries 100
            catalog_size: 10,
            max_concurrent_fetches: 3,
            audio_timeout_ms: 5000,
            reconnect_interval_ms: 5000,
            progress_interval_ms: 250,
            http_timeout_ms: 30_000,
            auto_unlock: false,
        }
    }
}

impl DisplayConfig {
    /// Load from `explicit` or the discovered `display.toml`, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config: DisplayConfig =
            kiosk_common::config::load_toml_or_default(explicit, CONFIG_FILE_NAME)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the rest of the client cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.catalog_size == 0 || self.catalog_size > MAX_ASSET_ID {
            return Err(Error::Config(format!(
                "catalog_size must be within 1..={}, got {}",
                MAX_ASSET_ID, self.catalog_size
            )));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(Error::Config(
                "max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if self.progress_interval_ms == 0 {
            return Err(Error::Config(
                "progress_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn locator(&self) -> MediaLocator {
        MediaLocator::new(self.media_base_url.clone())
    }

    pub fn audio_timeout(&self) -> Duration {
        Duration::from_millis(self.audio_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}
