//! Single-consumer event pipeline
//!
//! Everything the connection layer produces funnels into one task that owns
//! all mutable book state. Frames are admitted against the live epoch,
//! checked for flooding, throttled, and turned into published snapshots.
//! Running the whole chain on one task keeps ordering: a frame sent before
//! a reset is processed before it.

use arc_swap::ArcSwap;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use depthcast_core::{
    AggregatedLevel, Instrument, OrderBookSnapshot, SpreadHistory, SpreadSample, aggregate_levels,
    process_levels,
};

use crate::application::connection::ConnectionManager;
use crate::application::throttle::{FloodGuard, FloodVerdict, UpdateThrottle};
use crate::config::FeedTuning;
use crate::domain::{ConnectionEpoch, ConnectionState, PipelineEvent, RoutedEvent};
use crate::infrastructure::Transport;
use crate::presentation::{MarketUpdate, UpdatePublisher};

pub struct Pipeline<T: Transport> {
    manager: Arc<ConnectionManager<T>>,
    publisher: Arc<UpdatePublisher>,
    active: Arc<ArcSwap<Instrument>>,
    throttle: UpdateThrottle,
    flood: FloodGuard,
    flood_grace: Duration,
    /// Aggregates from the previous published book, for per-rank changes
    prev_bids: Vec<AggregatedLevel>,
    prev_asks: Vec<AggregatedLevel>,
    spreads: SpreadHistory,
    book: Arc<OrderBookSnapshot>,
    last_epoch: Option<ConnectionEpoch>,
    state: ConnectionState,
}

impl<T: Transport> Pipeline<T> {
    pub fn new(
        manager: Arc<ConnectionManager<T>>,
        publisher: Arc<UpdatePublisher>,
        active: Arc<ArcSwap<Instrument>>,
        tuning: &FeedTuning,
    ) -> Self {
        Pipeline {
            manager,
            publisher,
            active,
            throttle: UpdateThrottle::new(tuning.publish_interval()),
            flood: FloodGuard::new(tuning.flood_gap(), tuning.flood_limit),
            flood_grace: tuning.flood_grace(),
            prev_bids: Vec::new(),
            prev_asks: Vec::new(),
            spreads: SpreadHistory::new(),
            book: Arc::new(OrderBookSnapshot::default()),
            last_epoch: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<PipelineEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                PipelineEvent::Frame { epoch, at, event } => self.on_frame(epoch, at, event),
                PipelineEvent::State(state) => self.on_state(state),
                PipelineEvent::Reset => self.on_reset(),
            }
        }
        debug!("pipeline channel closed, stopping");
    }

    fn on_frame(&mut self, epoch: ConnectionEpoch, at: Instant, event: Option<RoutedEvent>) {
        // Admission: frames must carry the epoch of the live connection
        if self.manager.current_epoch() != Some(epoch) {
            debug!("dropping frame from stale epoch {}", epoch);
            return;
        }
        if self.last_epoch != Some(epoch) {
            // New connection: rank memory from the old stream is meaningless
            self.prev_bids.clear();
            self.prev_asks.clear();
            self.last_epoch = Some(epoch);
        }

        // Every admitted frame counts toward the flood check, routed or not
        if self.flood.observe(at) == FloodVerdict::Overloaded {
            warn!("inbound flood detected, cycling the connection");
            Arc::clone(&self.manager).cycle(self.flood_grace);
            return;
        }

        let Some(event) = event else { return };
        let (bids, asks) = match event {
            RoutedEvent::Delta { bids, asks } => (bids, asks),
            RoutedEvent::Snapshot { bids, asks } => (bids, asks),
            RoutedEvent::HeartbeatEcho { .. } => return,
        };

        if !self.throttle.admit(Instant::now()) {
            return;
        }

        let instrument = self.active.load_full();
        let bids = process_levels(&bids, &instrument);
        let mut asks = process_levels(&asks, &instrument);
        // Processing orders price-descending; asks display best-first, so
        // ascending
        asks.reverse();

        let bid_aggs = aggregate_levels(&bids, &self.prev_bids);
        let ask_aggs = aggregate_levels(&asks, &self.prev_asks);
        self.prev_bids = bid_aggs.clone();
        self.prev_asks = ask_aggs.clone();

        self.book = Arc::new(OrderBookSnapshot::new(bid_aggs, ask_aggs));
        if let Some(spread) = self.book.spread() {
            self.spreads.push(SpreadSample::new(Utc::now(), spread));
        }
        self.publish();
    }

    fn on_state(&mut self, state: ConnectionState) {
        self.state = state;
        // State changes go out immediately, the throttle only paces book
        // updates
        self.publish();
    }

    fn on_reset(&mut self) {
        self.prev_bids.clear();
        self.prev_asks.clear();
        self.spreads.clear();
        self.throttle.reset();
        self.flood.reset();
        self.last_epoch = None;
        self.book = Arc::new(OrderBookSnapshot::default());
        self.publish();
    }

    fn publish(&self) {
        let update = MarketUpdate {
            instrument: self.active.load_full(),
            state: self.state,
            book: Arc::clone(&self.book),
            spreads: Arc::new(self.spreads.to_vec()),
            imbalance: self.book.imbalance(),
        };
        self.publisher.publish(update);
    }
}
