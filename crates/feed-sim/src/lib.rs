//! Feed Simulator
//!
//! A scriptable WebSocket depth feed for exercising the gateway end to end.
//! Tests drive each accepted connection by hand: push frames, inspect what
//! the client sent, close politely or drop the socket like a failing peer.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

enum ServerCommand {
    Send(String),
    Close,
    Abort,
}

/// One accepted client connection, driven from the test
pub struct ServerConnection {
    /// Request path the client connected with
    pub path: String,
    outbound: mpsc::UnboundedSender<ServerCommand>,
    received: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl ServerConnection {
    /// Push a text frame to the client. False once the connection is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.outbound.send(ServerCommand::Send(text.into())).is_ok()
    }

    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        self.send_text(value.to_string())
    }

    /// Close politely with a close frame
    pub fn close(&self) {
        let _ = self.outbound.send(ServerCommand::Close);
    }

    /// Drop the socket without a close frame, as a failing peer would
    pub fn abort(&self) {
        let _ = self.outbound.send(ServerCommand::Abort);
    }

    /// Text frames the client has sent so far
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// First recorded inbound frame matching `pred`, polling until `wait`
    /// elapses
    pub async fn wait_for_frame<F>(&self, pred: F, wait: Duration) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(found) = self.received.lock().iter().find(|frame| pred(frame)) {
                return Some(found.clone());
            }
            if Instant::now() >= deadline {
                return None;
            }
            sleep(Duration::from_millis(10)).await;
        }
    }
}

/// WebSocket server bound to an ephemeral local port. Accepted connections
/// queue up for the test to claim with [`FeedServer::next_connection`].
pub struct FeedServer {
    addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<ServerConnection>,
    accept_task: JoinHandle<()>,
}

impl FeedServer {
    pub async fn start() -> std::io::Result<FeedServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (conn_tx, connections) = mpsc::unbounded_channel();

        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        tracing::debug!("accepted connection from {}", peer);
                        tokio::spawn(run_connection(stream, conn_tx.clone()));
                    }
                    Err(e) => {
                        tracing::debug!("accept failed: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(FeedServer {
            addr,
            connections,
            accept_task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stream base URL for client config, ending in the path prefix
    pub fn base_url(&self) -> String {
        format!("ws://{}/ws/", self.addr)
    }

    /// Next accepted connection in accept order. None if nothing shows up
    /// within five seconds.
    pub async fn next_connection(&mut self) -> Option<ServerConnection> {
        timeout(Duration::from_secs(5), self.connections.recv())
            .await
            .ok()
            .flatten()
    }
}

impl Drop for FeedServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn run_connection(stream: TcpStream, conns: mpsc::UnboundedSender<ServerConnection>) {
    let mut path = String::new();
    let callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        path = req.uri().path().to_string();
        Ok(response)
    };
    let ws = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!("handshake failed: {}", e);
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    let received = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicBool::new(false));

    let conn = ServerConnection {
        path,
        outbound: cmd_tx,
        received: Arc::clone(&received),
        closed: Arc::clone(&closed),
    };
    if conns.send(conn).is_err() {
        return;
    }

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(ServerCommand::Send(text)) => {
                    if write.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(ServerCommand::Close) => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                // Abort skips the close frame so the client sees a raw EOF
                Some(ServerCommand::Abort) | None => break,
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    received.lock().push(text.to_string());
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("read failed: {}", e);
                    break;
                }
            },
        }
    }
    closed.store(true, Ordering::SeqCst);
}
