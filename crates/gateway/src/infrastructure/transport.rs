use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Invalid address: {0}")]
    Address(#[from] url::ParseError),
    #[error("Handshake failed: {0}")]
    Handshake(String),
    #[error("Channel closed")]
    ChannelClosed,
}

/// Events surfaced by a live connection
#[derive(Debug)]
pub enum TransportEvent {
    /// One inbound text frame
    Frame(String),
    /// The peer ended the stream
    Closed,
    /// The stream failed
    Error(String),
}

/// A live connection: a sink for outbound text frames and a stream of
/// inbound events. Dropping `outbound` closes the write half cleanly.
pub struct TransportConn {
    pub outbound: mpsc::Sender<String>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Seam between the connection manager and the wire, so the lifecycle
/// machinery is testable without sockets
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, address: &str) -> Result<TransportConn, TransportError>;
}
