//! Outbound update surface
//!
//! Consumers get a broadcast stream of [`MarketUpdate`]s plus a cheap
//! load of the most recent one. A consumer that falls behind skips ahead;
//! every update is a complete view, so nothing has to be replayed.

use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::broadcast;

use depthcast_core::{Instrument, OrderBookSnapshot, SpreadSample};

use crate::domain::ConnectionState;

/// Broadcast queue depth; laggards skip to the newest update
pub const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// One published view of the feed. Everything a display needs for a frame:
/// the book, the spread history, the imbalance and the connection state.
#[derive(Debug, Clone)]
pub struct MarketUpdate {
    pub instrument: Arc<Instrument>,
    pub state: ConnectionState,
    pub book: Arc<OrderBookSnapshot>,
    pub spreads: Arc<Vec<SpreadSample>>,
    pub imbalance: f64,
}

impl MarketUpdate {
    /// Bookless update, used before the first frame lands
    pub fn empty(instrument: Arc<Instrument>, state: ConnectionState) -> Self {
        MarketUpdate {
            instrument,
            state,
            book: Arc::new(OrderBookSnapshot::default()),
            spreads: Arc::new(Vec::new()),
            imbalance: 0.0,
        }
    }
}

pub struct UpdatePublisher {
    tx: broadcast::Sender<MarketUpdate>,
    latest: ArcSwap<MarketUpdate>,
}

impl UpdatePublisher {
    pub fn new(capacity: usize, initial: MarketUpdate) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        UpdatePublisher {
            tx,
            latest: ArcSwap::from_pointee(initial),
        }
    }

    /// Store the update as latest and fan it out. Publishing with no
    /// subscribers is not an error.
    pub fn publish(&self, update: MarketUpdate) {
        self.latest.store(Arc::new(update.clone()));
        let _ = self.tx.send(update);
    }

    pub fn latest(&self) -> MarketUpdate {
        self.latest.load().as_ref().clone()
    }

    pub fn subscribe(&self) -> UpdateStream {
        UpdateStream {
            rx: self.tx.subscribe(),
        }
    }
}

pub struct UpdateStream {
    rx: broadcast::Receiver<MarketUpdate>,
}

impl UpdateStream {
    /// Next update, or None once the publisher is gone. Lag is absorbed by
    /// jumping to the oldest retained update.
    pub async fn next(&mut self) -> Option<MarketUpdate> {
        loop {
            match self.rx.recv().await {
                Ok(update) => return Some(update),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("update consumer lagged, skipped {} updates", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> UpdatePublisher {
        let instrument = Arc::new(Instrument::new("btcusdt", "BTC/USDT"));
        UpdatePublisher::new(
            8,
            MarketUpdate::empty(instrument, ConnectionState::Disconnected),
        )
    }

    #[tokio::test]
    async fn test_latest_tracks_last_publish() {
        let publisher = publisher();
        assert_eq!(publisher.latest().state, ConnectionState::Disconnected);

        let mut update = publisher.latest();
        update.state = ConnectionState::Connected;
        update.imbalance = 0.25;
        publisher.publish(update);

        let latest = publisher.latest();
        assert_eq!(latest.state, ConnectionState::Connected);
        assert_eq!(latest.imbalance, 0.25);
    }

    #[tokio::test]
    async fn test_subscribers_receive_updates() {
        let publisher = publisher();
        let mut stream = publisher.subscribe();

        let mut update = publisher.latest();
        update.state = ConnectionState::Connecting;
        publisher.publish(update);

        let received = stream.next().await.unwrap();
        assert_eq!(received.state, ConnectionState::Connecting);
    }
}
