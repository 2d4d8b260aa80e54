//! Bounded-depth market view

use crate::levels::AggregatedLevel;
use serde::{Deserialize, Serialize};

/// One instrument's visible book: bids descending, asks ascending, each side
/// capped at [`crate::levels::BOOK_DEPTH`] rows. Snapshots are immutable
/// once built; every admitted update replaces the whole view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub bids: Vec<AggregatedLevel>,
    pub asks: Vec<AggregatedLevel>,
}

impl OrderBookSnapshot {
    pub fn new(bids: Vec<AggregatedLevel>, asks: Vec<AggregatedLevel>) -> Self {
        OrderBookSnapshot { bids, asks }
    }

    #[inline]
    pub fn best_bid(&self) -> Option<&AggregatedLevel> {
        self.bids.first()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<&AggregatedLevel> {
        self.asks.first()
    }

    /// Best-ask minus best-bid, floored at zero for crossed quotes.
    /// None until both sides have depth.
    pub fn spread(&self) -> Option<f64> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some((ask - bid).max(0.0))
    }

    pub fn mid_price(&self) -> Option<f64> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some((bid + ask) / 2.0)
    }

    /// Volume imbalance (bid - ask) / (bid + ask) over the visible depth,
    /// in [-1, 1]. Zero when the book is empty.
    pub fn imbalance(&self) -> f64 {
        let bid_volume: f64 = self.bids.iter().map(|level| level.amount).sum();
        let ask_volume: f64 = self.asks.iter().map(|level| level.amount).sum();
        let total = bid_volume + ask_volume;
        if total == 0.0 {
            0.0
        } else {
            (bid_volume - ask_volume) / total
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
