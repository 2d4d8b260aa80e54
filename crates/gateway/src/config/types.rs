use serde::{Deserialize, Serialize};
use std::time::Duration;

use depthcast_core::Instrument;

/// Root configuration for the feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Instruments the feed can serve; the first entry is shown at startup
    pub instruments: Vec<InstrumentConfig>,
    /// Stream endpoint layout
    pub stream: StreamConfig,
    /// Timing knobs; the defaults match the production feed
    #[serde(default)]
    pub tuning: FeedTuning,
}

/// One catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Symbol as the feed spells it (e.g. "btcusdt")
    pub feed_symbol: String,
    /// Name shown to consumers (e.g. "BTC/USDT")
    pub display_name: String,
}

impl InstrumentConfig {
    pub fn to_instrument(&self) -> Instrument {
        Instrument::new(&self.feed_symbol, &self.display_name)
    }
}

/// Stream endpoint layout; the connection address for an instrument is
/// `{base_url}{feed_symbol}{suffix}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub base_url: String,
    #[serde(default = "default_stream_suffix")]
    pub suffix: String,
}

impl StreamConfig {
    pub fn address_for(&self, instrument: &Instrument) -> String {
        format!("{}{}{}", self.base_url, instrument.feed_symbol, self.suffix)
    }
}

/// Timing and bound knobs for the feed machinery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedTuning {
    /// Minimum interval between published updates in milliseconds
    #[serde(default = "default_publish_interval")]
    pub publish_interval_ms: u64,
    /// Connect attempts give up after this long
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Delay before reconnecting after a failure
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Keepalive send interval
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// Close requests within this window of the previous one are ignored
    #[serde(default = "default_close_guard")]
    pub close_guard_ms: u64,
    /// Pause between clearing derived state and moving the connection on
    /// an instrument switch
    #[serde(default = "default_switch_settle")]
    pub switch_settle_ms: u64,
    /// Reconnect delay after a flood teardown
    #[serde(default = "default_flood_grace")]
    pub flood_grace_ms: u64,
    /// Messages arriving faster than this count toward the flood counter
    #[serde(default = "default_flood_gap")]
    pub flood_gap_ms: u64,
    /// Consecutive fast messages beyond this force a reconnect
    #[serde(default = "default_flood_limit")]
    pub flood_limit: u32,
}

fn default_publish_interval() -> u64 {
    500
}

fn default_connect_timeout() -> u64 {
    5_000
}

fn default_reconnect_delay() -> u64 {
    3_000
}

fn default_heartbeat_interval() -> u64 {
    15_000
}

fn default_close_guard() -> u64 {
    1_000
}

fn default_switch_settle() -> u64 {
    500
}

fn default_flood_grace() -> u64 {
    1_000
}

fn default_flood_gap() -> u64 {
    1_000
}

fn default_flood_limit() -> u32 {
    100
}

fn default_stream_suffix() -> String {
    "@depth20@1000ms".to_string()
}

impl Default for FeedTuning {
    fn default() -> Self {
        FeedTuning {
            publish_interval_ms: default_publish_interval(),
            connect_timeout_ms: default_connect_timeout(),
            reconnect_delay_ms: default_reconnect_delay(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            close_guard_ms: default_close_guard(),
            switch_settle_ms: default_switch_settle(),
            flood_grace_ms: default_flood_grace(),
            flood_gap_ms: default_flood_gap(),
            flood_limit: default_flood_limit(),
        }
    }
}

impl FeedTuning {
    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn close_guard(&self) -> Duration {
        Duration::from_millis(self.close_guard_ms)
    }

    pub fn switch_settle(&self) -> Duration {
        Duration::from_millis(self.switch_settle_ms)
    }

    pub fn flood_grace(&self) -> Duration {
        Duration::from_millis(self.flood_grace_ms)
    }

    pub fn flood_gap(&self) -> Duration {
        Duration::from_millis(self.flood_gap_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuning_defaults() {
        let tuning = FeedTuning::default();
        assert_eq!(tuning.publish_interval(), Duration::from_millis(500));
        assert_eq!(tuning.connect_timeout(), Duration::from_secs(5));
        assert_eq!(tuning.reconnect_delay(), Duration::from_secs(3));
        assert_eq!(tuning.heartbeat_interval(), Duration::from_secs(15));
        assert_eq!(tuning.switch_settle(), Duration::from_millis(500));
        assert_eq!(tuning.flood_limit, 100);
    }

    #[test]
    fn test_address_layout() {
        let stream = StreamConfig {
            base_url: "wss://feed.example/ws/".to_string(),
            suffix: "@depth20@1000ms".to_string(),
        };
        let inst = Instrument::new("btcusdt", "BTC/USDT");
        assert_eq!(
            stream.address_for(&inst),
            "wss://feed.example/ws/btcusdt@depth20@1000ms"
        );
    }
}
