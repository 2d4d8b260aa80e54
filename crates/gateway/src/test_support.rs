//! Scripted in-memory transport for exercising the connection machinery
//! without sockets

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::infrastructure::{Transport, TransportConn, TransportError, TransportEvent};

/// Server half of a scripted connection. Dropping it ends the inbound
/// event stream the way an abnormal disconnect would.
pub(crate) struct ScriptedConn {
    pub(crate) address: String,
    pub(crate) events: mpsc::Sender<TransportEvent>,
    pub(crate) outbound: mpsc::Receiver<String>,
}

impl ScriptedConn {
    pub(crate) async fn send_frame(&self, raw: String) {
        self.events
            .send(TransportEvent::Frame(raw))
            .await
            .expect("client side went away");
    }

    pub(crate) async fn send_event(&self, event: TransportEvent) {
        self.events
            .send(event)
            .await
            .expect("client side went away");
    }
}

#[derive(Default)]
struct ScriptedInner {
    conns: Mutex<VecDeque<ScriptedConn>>,
    connects: AtomicUsize,
    refuse: AtomicBool,
    stall: AtomicBool,
}

/// Scripted [`Transport`]: every connect hands the test the server half of
/// an in-memory channel pair. Connects can be refused or stalled to model
/// dead endpoints.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    inner: Arc<ScriptedInner>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of connect attempts seen, including refused and stalled ones
    pub(crate) fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn refuse(&self, on: bool) {
        self.inner.refuse.store(on, Ordering::SeqCst);
    }

    pub(crate) fn stall(&self, on: bool) {
        self.inner.stall.store(on, Ordering::SeqCst);
    }

    /// Next accepted connection, oldest first. Panics after two seconds so
    /// a missing dial fails the test instead of hanging it.
    pub(crate) async fn take_conn(&self) -> ScriptedConn {
        for _ in 0..400 {
            if let Some(conn) = self.inner.conns.lock().pop_front() {
                return conn;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("no connection arrived");
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, address: &str) -> Result<TransportConn, TransportError> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        if self.inner.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.inner.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Handshake("refused by script".to_string()));
        }
        let (outbound_tx, outbound_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(64);
        self.inner.conns.lock().push_back(ScriptedConn {
            address: address.to_string(),
            events: event_tx,
            outbound: outbound_rx,
        });
        Ok(TransportConn {
            outbound: outbound_tx,
            events: event_rx,
        })
    }
}
