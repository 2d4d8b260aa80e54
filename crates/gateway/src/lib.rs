//! Depthcast Gateway
//!
//! Feed client that maintains a bounded order book view over an unreliable
//! WebSocket stream.
//!
//! # Architecture
//!
//! The gateway:
//! - Connects to one depth stream at a time, reconnecting on failure
//! - Routes inbound frames by shape and drops anything stale or malformed
//! - Rebuilds a capped, aggregated book from every admitted update
//! - Publishes throttled snapshots to display consumers
//!
//! ```text
//! ┌──────────────┐
//! │  Depth feed  │
//! └──────┬───────┘
//!        │ WebSocket
//!        ▼
//! ┌─────────────────────────────────────────────────┐
//! │                    Gateway                      │
//! │  ┌───────────────────┐   ┌───────────────────┐  │
//! │  │ ConnectionManager │──▶│   MessageRouter   │  │
//! │  │ (epochs, retries) │   │ (frames by shape) │  │
//! │  └───────────────────┘   └─────────┬─────────┘  │
//! │                                    │            │
//! │  ┌─────────────────────────────────▼─────────┐  │
//! │  │                 Pipeline                  │  │
//! │  │  (admission, flood check, levels, book,   │  │
//! │  │   spread history, throttled publish)      │  │
//! │  └─────────────────────┬─────────────────────┘  │
//! │                        │                        │
//! │  ┌─────────────────────▼─────────────────────┐  │
//! │  │              UpdatePublisher              │  │
//! │  │     (broadcast stream + latest view)      │  │
//! │  └───────────────────────────────────────────┘  │
//! └────────────────────────┬────────────────────────┘
//!                          │ MarketUpdate
//!                          ▼
//!                   ┌─────────────┐
//!                   │   Display   │
//!                   └─────────────┘
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types
pub use domain::{ConnectionEpoch, ConnectionState, PipelineEvent, RoutedEvent};

pub use application::{FeedHandle, InstrumentSwitcher};

pub use config::{
    ConfigError, FeedConfig, FeedTuning, InstrumentConfig, StreamConfig, load_config,
    load_config_from_str, load_default_config,
};

pub use error::FeedError;

pub use infrastructure::{Transport, TransportConn, TransportError, TransportEvent, WsTransport};

pub use presentation::{MarketUpdate, UpdatePublisher, UpdateStream};
