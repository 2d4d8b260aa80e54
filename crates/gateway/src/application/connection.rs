//! Connection lifecycle management
//!
//! Owns the transport connection and its two per-connection tasks: the pump
//! (forwarding inbound frames to the pipeline) and the heartbeat (periodic
//! keepalive sends). Every opened connection gets a fresh epoch; the pump
//! tags everything it forwards with that epoch so the pipeline can refuse
//! frames from connections that are no longer live.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout};
use tracing::{debug, error, info, warn};

use depthcast_core::Instrument;

use crate::config::{FeedTuning, StreamConfig};
use crate::domain::{ConnectionEpoch, ConnectionState, PipelineEvent, RoutedEvent};
use crate::error::FeedError;
use crate::infrastructure::{Transport, TransportConn, TransportEvent, route};

/// Fixed keepalive frame the feed expects on a schedule
const KEEPALIVE_FRAME: &str = r#"{"event":"ping"}"#;

struct LiveConn {
    epoch: ConnectionEpoch,
    address: String,
    outbound: mpsc::Sender<String>,
    pump: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

struct ManagerState {
    state: ConnectionState,
    /// Instrument the most recent open() targeted; reconnects reuse it
    instrument: Arc<Instrument>,
    conn: Option<LiveConn>,
    reconnect: Option<JoinHandle<()>>,
    close_requested: bool,
    last_close: Option<Instant>,
    /// Generation counter for dial attempts; a bump abandons in-flight dials
    attempt: u64,
}

/// Connection state machine over a pluggable [`Transport`].
///
/// All mutating entry points are safe to call from any task: teardown never
/// awaits, so the pump and heartbeat can tear down the connection they
/// belong to without deadlocking on their own abort.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    stream: StreamConfig,
    tuning: FeedTuning,
    active: Arc<ArcSwap<Instrument>>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    epochs: AtomicU64,
    /// Epoch of the installed connection; 0 while none is live
    live_epoch: AtomicU64,
    state: Mutex<ManagerState>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(
        transport: T,
        stream: StreamConfig,
        tuning: FeedTuning,
        active: Arc<ArcSwap<Instrument>>,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Arc<Self> {
        let instrument = active.load_full();
        Arc::new(ConnectionManager {
            transport,
            stream,
            tuning,
            active,
            events,
            epochs: AtomicU64::new(0),
            live_epoch: AtomicU64::new(0),
            state: Mutex::new(ManagerState {
                state: ConnectionState::Disconnected,
                instrument,
                conn: None,
                reconnect: None,
                close_requested: false,
                last_close: None,
                attempt: 0,
            }),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state.lock().state
    }

    /// Epoch of the live connection, None while nothing is installed
    pub fn current_epoch(&self) -> Option<ConnectionEpoch> {
        match self.live_epoch.load(Ordering::SeqCst) {
            0 => None,
            value => Some(ConnectionEpoch::new(value)),
        }
    }

    /// Replace whatever is running with a connection for `instrument`.
    /// Resolves once the transport is up or the attempt failed; a failed
    /// attempt leaves a reconnect pending.
    pub async fn open(
        self: Arc<Self>,
        instrument: Arc<Instrument>,
    ) -> Result<ConnectionEpoch, FeedError> {
        let attempt = {
            let mut state = self.state.lock();
            state.close_requested = false;
            state.instrument = Arc::clone(&instrument);
            state.attempt += 1;
            state.attempt
        };
        self.teardown();
        self.establish(instrument, attempt).await
    }

    /// Shut the connection down and stay down: no reconnect fires until the
    /// next open(). Repeated calls inside the guard window are ignored.
    pub fn close(&self) -> bool {
        let (conn, changed) = {
            let mut state = self.state.lock();
            let now = Instant::now();
            if let Some(last) = state.last_close {
                let since = now.duration_since(last);
                if since < self.tuning.close_guard() {
                    debug!("close ignored, previous close ran {:?} ago", since);
                    return false;
                }
            }
            state.last_close = Some(now);
            state.close_requested = true;
            state.attempt += 1;

            let conn = state.conn.take();
            if let Some(conn) = &conn {
                conn.pump.abort();
                conn.heartbeat.abort();
            }
            self.live_epoch.store(0, Ordering::SeqCst);

            if let Some(handle) = state.reconnect.take() {
                handle.abort();
            }

            let changed = state.state != ConnectionState::Disconnected;
            state.state = ConnectionState::Disconnected;
            (conn, changed)
        };

        // Dropping the connection here releases the outbound sender, which
        // lets the transport writer send its close frame
        if let Some(conn) = conn {
            info!("closed connection to {}", conn.address);
        }
        if changed {
            let _ = self
                .events
                .send(PipelineEvent::State(ConnectionState::Disconnected));
        }
        true
    }

    /// Tear the connection down now and reopen after `grace`. Used when the
    /// inbound stream floods and needs breathing room, not a full failure
    /// backoff.
    pub fn cycle(self: Arc<Self>, grace: Duration) {
        warn!("cycling connection, reopening in {:?}", grace);
        {
            let mut state = self.state.lock();
            state.attempt += 1;
        }
        self.teardown();
        self.set_state(ConnectionState::Error);
        self.schedule_reconnect(grace);
    }

    /// Abort the live connection's tasks and any pending reconnect.
    /// Callers decide what state follows.
    fn teardown(&self) {
        let conn = {
            let mut state = self.state.lock();
            if let Some(handle) = state.reconnect.take() {
                handle.abort();
            }
            self.live_epoch.store(0, Ordering::SeqCst);
            state.conn.take()
        };
        if let Some(conn) = conn {
            conn.pump.abort();
            conn.heartbeat.abort();
            debug!("tore down connection to {}", conn.address);
        }
    }

    fn set_state(&self, next: ConnectionState) {
        {
            let mut state = self.state.lock();
            if state.state == next {
                return;
            }
            state.state = next;
        }
        let _ = self.events.send(PipelineEvent::State(next));
    }

    async fn establish(
        self: Arc<Self>,
        instrument: Arc<Instrument>,
        attempt: u64,
    ) -> Result<ConnectionEpoch, FeedError> {
        let address = self.stream.address_for(&instrument);
        self.set_state(ConnectionState::Connecting);
        info!("connecting to {}", address);

        let connect = self.transport.connect(&address);
        let conn = match timeout(self.tuning.connect_timeout(), connect).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                error!("connect to {} failed: {}", address, e);
                self.connect_failed(attempt);
                return Err(e.into());
            }
            Err(_) => {
                error!(
                    "connect to {} timed out after {:?}",
                    address,
                    self.tuning.connect_timeout()
                );
                self.connect_failed(attempt);
                return Err(FeedError::ConnectTimeout);
            }
        };

        let TransportConn { outbound, events } = conn;
        let epoch = ConnectionEpoch::new(self.epochs.fetch_add(1, Ordering::SeqCst) + 1);
        {
            let mut state = self.state.lock();
            // A close or a newer attempt won the race while we were dialing
            if state.close_requested || state.attempt != attempt {
                debug!("connection to {} abandoned before install", address);
                return Err(FeedError::Superseded);
            }

            self.live_epoch.store(epoch.value(), Ordering::SeqCst);

            let pump = tokio::spawn(Arc::clone(&self).pump(epoch, address.clone(), events));
            let heartbeat = tokio::spawn(Arc::clone(&self).heartbeat(epoch, outbound.clone()));

            state.conn = Some(LiveConn {
                epoch,
                address: address.clone(),
                outbound,
                pump,
                heartbeat,
            });
            state.state = ConnectionState::Connected;
        }
        let _ = self
            .events
            .send(PipelineEvent::State(ConnectionState::Connected));
        info!("connected to {} (epoch {})", address, epoch);
        Ok(epoch)
    }

    fn connect_failed(self: Arc<Self>, attempt: u64) {
        {
            let mut state = self.state.lock();
            if state.close_requested || state.attempt != attempt {
                return;
            }
            state.state = ConnectionState::Error;
        }
        let _ = self.events.send(PipelineEvent::State(ConnectionState::Error));
        let delay = self.tuning.reconnect_delay();
        self.schedule_reconnect(delay);
    }

    fn schedule_reconnect(self: Arc<Self>, delay: Duration) {
        let mut state = self.state.lock();
        if state.close_requested {
            return;
        }
        if let Some(handle) = &state.reconnect
            && !handle.is_finished()
        {
            debug!("reconnect already pending");
            return;
        }
        state.attempt += 1;
        let attempt = state.attempt;
        let instrument = Arc::clone(&state.instrument);
        let manager = Arc::clone(&self);
        debug!("reconnect scheduled in {:?}", delay);
        state.reconnect = Some(tokio::spawn(async move {
            sleep(delay).await;
            // Detach before dialing so a failure can schedule the next try
            manager.state.lock().reconnect = None;
            if let Err(e) = Arc::clone(&manager).establish(instrument, attempt).await {
                debug!("reconnect attempt failed: {}", e);
            }
        }));
    }

    /// Transport loss reported by the pump or heartbeat of `epoch`. A lost
    /// connection that was already replaced is ignored.
    fn on_transport_down(self: Arc<Self>, epoch: ConnectionEpoch, reason: &str) {
        let (schedule, next) = {
            let mut state = self.state.lock();
            match state.conn.take() {
                Some(conn) if conn.epoch == epoch => {
                    warn!(
                        "connection to {} lost (epoch {}): {}",
                        conn.address, epoch, reason
                    );
                    conn.pump.abort();
                    conn.heartbeat.abort();
                    self.live_epoch.store(0, Ordering::SeqCst);
                    let next = if state.close_requested {
                        ConnectionState::Disconnected
                    } else {
                        ConnectionState::Error
                    };
                    state.state = next;
                    (!state.close_requested, next)
                }
                other => {
                    state.conn = other;
                    debug!("ignoring transport loss for stale epoch {}", epoch);
                    return;
                }
            }
        };
        let _ = self.events.send(PipelineEvent::State(next));
        if schedule {
            let delay = self.tuning.reconnect_delay();
            self.schedule_reconnect(delay);
        }
    }

    async fn pump(
        self: Arc<Self>,
        epoch: ConnectionEpoch,
        address: String,
        mut events: mpsc::Receiver<TransportEvent>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Frame(raw) => self.handle_frame(epoch, &address, &raw),
                TransportEvent::Closed => {
                    self.on_transport_down(epoch, "stream closed by peer");
                    return;
                }
                TransportEvent::Error(e) => {
                    self.on_transport_down(epoch, &e);
                    return;
                }
            }
        }
        self.on_transport_down(epoch, "transport channel dropped");
    }

    fn handle_frame(&self, epoch: ConnectionEpoch, address: &str, raw: &str) {
        let active = self.active.load_full();
        let event = route(raw, &active, address);

        if let Some(RoutedEvent::HeartbeatEcho { token }) = &event {
            self.send_heartbeat_reply(epoch, token);
        }

        let _ = self.events.send(PipelineEvent::Frame {
            epoch,
            at: Instant::now(),
            event,
        });
    }

    fn send_heartbeat_reply(&self, epoch: ConnectionEpoch, token: &Value) {
        if self.live_epoch.load(Ordering::SeqCst) != epoch.value() {
            return;
        }
        let outbound = {
            let state = self.state.lock();
            match &state.conn {
                Some(conn) if conn.epoch == epoch => Some(conn.outbound.clone()),
                _ => None,
            }
        };
        let Some(outbound) = outbound else { return };
        let reply = json!({ "pong": token }).to_string();
        if outbound.try_send(reply).is_err() {
            debug!("heartbeat reply dropped, outbound queue unavailable");
        }
    }

    async fn heartbeat(self: Arc<Self>, epoch: ConnectionEpoch, outbound: mpsc::Sender<String>) {
        let mut ticker = interval(self.tuning.heartbeat_interval());
        // The first tick fires immediately; skip it so sends start one
        // interval after connect
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if self.live_epoch.load(Ordering::SeqCst) != epoch.value() {
                return;
            }
            if outbound.send(KEEPALIVE_FRAME.to_string()).await.is_err() {
                warn!("keepalive send failed, tearing the connection down");
                self.on_transport_down(epoch, "keepalive send failed");
                return;
            }
        }
    }
}
