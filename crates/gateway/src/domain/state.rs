use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity token minted for each opened connection.
///
/// Every event coming off a connection carries the epoch it was received
/// under, and the pipeline drops anything whose epoch is not the live one.
/// This is what makes close() take effect immediately: frames from a dying
/// socket can still arrive, but they can never pass admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionEpoch(u64);

impl ConnectionEpoch {
    pub fn new(value: u64) -> Self {
        ConnectionEpoch(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection lifecycle as consumers observe it.
/// Owned by the connection manager; everyone else only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No connection and none being attempted
    Disconnected,
    /// Dialing; drops back to Disconnected only through an explicit close
    Connecting,
    /// Transport is up and frames are flowing
    Connected,
    /// The last attempt or connection failed; a reconnect may be pending
    Error,
}

impl ConnectionState {
    /// True when feed data can currently arrive
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// True while an attempt is in flight
    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionState::Connecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        write!(f, "{}", label)
    }
}
