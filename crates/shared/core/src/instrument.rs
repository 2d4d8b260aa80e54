use serde::{Deserialize, Serialize};
use std::fmt;

/// A market pair the feed can serve
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// Symbol as the feed spells it in stream addresses and message tags (lowercase)
    pub feed_symbol: String,
    /// Name shown to consumers, e.g. "BTC/USDT"
    pub display_name: String,
}

impl Instrument {
    pub fn new(feed_symbol: impl Into<String>, display_name: impl Into<String>) -> Self {
        Instrument {
            feed_symbol: feed_symbol.into().to_lowercase(),
            display_name: display_name.into(),
        }
    }

    /// True when `tag` names this instrument, however the feed cases it
    pub fn matches_tag(&self, tag: &str) -> bool {
        self.feed_symbol.eq_ignore_ascii_case(tag)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)
    }
}
