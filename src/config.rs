//! Runtime configuration with env overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_KUBO_API: &str = "http://localhost:5001/api/v0";
pub const DEFAULT_FEED_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Kubo (IPFS) daemon API root.
    pub kubo_api: String,
    /// Background feed sync interval in seconds.
    pub feed_interval_secs: u64,
    /// Disable the feed layer entirely when false.
    pub feeds_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kubo_api: DEFAULT_KUBO_API.to_string(),
            feed_interval_secs: DEFAULT_FEED_INTERVAL_SECS,
            feeds_enabled: true,
        }
    }
}

impl Config {
    /// Defaults overridden by `MEMEX_KUBO_API`, `MEMEX_FEED_INTERVAL_SECS`,
    /// and `MEMEX_NO_FEEDS`.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(url) = std::env::var("MEMEX_KUBO_API") {
            if !url.trim().is_empty() {
                config.kubo_api = url;
            }
        }
        if let Ok(secs) = std::env::var("MEMEX_FEED_INTERVAL_SECS") {
            if let Ok(secs) = secs.trim().parse::<u64>() {
                config.feed_interval_secs = secs;
            }
        }
        if std::env::var("MEMEX_NO_FEEDS").is_ok() {
            config.feeds_enabled = false;
        }

        config
    }

    pub fn feed_interval(&self) -> Duration {
        Duration::from_secs(self.feed_interval_secs)
    }
}
