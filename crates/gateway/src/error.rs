use thiserror::Error;

use crate::config::ConfigError;
use crate::infrastructure::TransportError;

/// Errors surfaced by feed operations
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("connect attempt timed out")]
    ConnectTimeout,
    #[error("connection attempt superseded")]
    Superseded,
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),
}
