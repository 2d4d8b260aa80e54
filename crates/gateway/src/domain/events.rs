use serde_json::Value;
use std::time::Instant;

use super::state::{ConnectionEpoch, ConnectionState};

/// A frame the router recognized
#[derive(Debug, Clone)]
pub enum RoutedEvent {
    /// Server liveness probe; the echo reply is the only effect, nothing
    /// reaches consumers
    HeartbeatEcho { token: Value },
    /// Symbol-tagged depth update for the active instrument
    Delta { bids: Value, asks: Value },
    /// Untagged full book snapshot from the active stream address
    Snapshot { bids: Value, asks: Value },
}

/// Input to the snapshot pipeline
#[derive(Debug)]
pub enum PipelineEvent {
    /// One inbound frame. `event` is None when the router recognized
    /// nothing; such frames still count toward flood detection.
    Frame {
        epoch: ConnectionEpoch,
        at: Instant,
        event: Option<RoutedEvent>,
    },
    /// The connection state changed
    State(ConnectionState),
    /// All derived market state must be dropped (instrument switch)
    Reset,
}
