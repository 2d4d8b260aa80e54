//! Inbound adapters: the wire transport and frame routing

pub mod router;
pub mod transport;
pub mod ws;

pub use router::route;
pub use transport::{Transport, TransportConn, TransportError, TransportEvent};
pub use ws::WsTransport;
