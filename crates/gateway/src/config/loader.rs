use std::path::Path;
use thiserror::Error;

use depthcast_core::Instrument;

use super::types::FeedConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("No instruments in config")]
    NoInstruments,
    #[error("Stream base URL must be ws:// or wss://: {0}")]
    BadStreamUrl(String),
    #[error("Invalid tuning: {0}")]
    Tuning(&'static str),
}

/// Load feed configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FeedConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: FeedConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<FeedConfig, ConfigError> {
    let config: FeedConfig = serde_json::from_str(json)?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<FeedConfig, ConfigError> {
    let default_config = include_str!("feed_config.json");
    load_config_from_str(default_config)
}

impl FeedConfig {
    /// Look up a catalog instrument by feed symbol
    pub fn instrument(&self, feed_symbol: &str) -> Option<Instrument> {
        let wanted = feed_symbol.to_lowercase();
        self.instruments
            .iter()
            .find(|entry| entry.feed_symbol.to_lowercase() == wanted)
            .map(|entry| entry.to_instrument())
    }

    /// The instrument shown when the feed starts (first catalog entry)
    pub fn startup_instrument(&self) -> Option<Instrument> {
        self.instruments.first().map(|entry| entry.to_instrument())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::NoInstruments);
        }
        if !self.stream.base_url.starts_with("ws://") && !self.stream.base_url.starts_with("wss://")
        {
            return Err(ConfigError::BadStreamUrl(self.stream.base_url.clone()));
        }
        if self.tuning.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Tuning("heartbeat_interval_ms must be positive"));
        }
        Ok(())
    }
}
