use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use super::transport::{Transport, TransportConn, TransportError, TransportEvent};

/// Production transport over tokio-tungstenite
///
/// Splits the socket into two tasks bridged by channels: a writer draining
/// the outbound queue and a reader forwarding inbound events. When the
/// outbound sender is dropped the writer sends a close frame and exits;
/// when the event receiver is dropped the reader exits and the socket
/// follows.
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, address: &str) -> Result<TransportConn, TransportError> {
        Url::parse(address)?;
        let (ws_stream, _) = connect_async(address).await?;
        let (mut write, mut read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<String>(32);
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(1024);

        // Outgoing frames until the sender side goes away
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if write.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
            }
            let _ = write.send(Message::Close(None)).await;
        });

        // Incoming frames; EOF without a close frame is reported as Closed
        tokio::spawn(async move {
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if event_tx
                            .send(TransportEvent::Frame(text.to_string()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        let _ = event_tx.send(TransportEvent::Closed).await;
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        tracing::trace!("received ping: {:?}", data);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                        break;
                    }
                }
            }
        });

        Ok(TransportConn {
            outbound: out_tx,
            events: event_rx,
        })
    }
}
