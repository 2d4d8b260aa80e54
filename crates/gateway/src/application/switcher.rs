//! Instrument switching
//!
//! Switch requests are applied one at a time by a dedicated worker so that
//! rapid requests cannot interleave their teardown and dial phases. Each
//! apply runs the same sequence: retarget the router, clear derived state,
//! let in-flight frames drain, then move the connection.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use depthcast_core::Instrument;

use crate::application::connection::ConnectionManager;
use crate::domain::PipelineEvent;
use crate::infrastructure::Transport;

/// Handle for requesting instrument switches. Cheap to clone; all clones
/// feed the same worker queue.
#[derive(Clone)]
pub struct InstrumentSwitcher {
    tx: mpsc::UnboundedSender<Arc<Instrument>>,
    active: Arc<ArcSwap<Instrument>>,
}

impl InstrumentSwitcher {
    /// Queue a switch to `target`. Returns false without queueing when the
    /// target is already the active instrument.
    pub fn request(&self, target: Arc<Instrument>) -> bool {
        if *self.active.load_full() == *target {
            debug!("switch to {} ignored, already active", target);
            return false;
        }
        self.tx.send(target).is_ok()
    }
}

pub fn spawn_switch_worker<T: Transport>(
    manager: Arc<ConnectionManager<T>>,
    active: Arc<ArcSwap<Instrument>>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    settle: Duration,
) -> InstrumentSwitcher {
    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<Instrument>>();
    let switcher = InstrumentSwitcher {
        tx,
        active: Arc::clone(&active),
    };

    tokio::spawn(async move {
        while let Some(target) = rx.recv().await {
            // Queued duplicates collapse once an earlier request applied
            if *active.load_full() == *target {
                debug!("switch to {} ignored, already active", target);
                continue;
            }
            info!("switching to {}", target);

            // Retarget the router first so frames from the old stream stop
            // matching, then wipe the derived view
            active.store(Arc::clone(&target));
            let _ = events.send(PipelineEvent::Reset);
            sleep(settle).await;

            manager.close();
            if let Err(e) = Arc::clone(&manager).open(Arc::clone(&target)).await {
                warn!("switch to {} could not connect: {}", target, e);
            }
            sleep(settle).await;
        }
        debug!("switch worker stopping");
    });

    switcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeedTuning, StreamConfig};
    use crate::test_support::ScriptedTransport;
    use std::time::Instant;

    #[tokio::test]
    async fn test_switches_apply_in_request_order() {
        let transport = ScriptedTransport::new();
        let btc = Arc::new(Instrument::new("btcusdt", "BTC/USDT"));
        let eth = Arc::new(Instrument::new("ethusdt", "ETH/USDT"));
        let xmr = Arc::new(Instrument::new("xmrbtc", "XMR/BTC"));
        let active = Arc::new(ArcSwap::from(Arc::clone(&btc)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tuning = FeedTuning {
            close_guard_ms: 0,
            ..FeedTuning::default()
        };
        let manager = ConnectionManager::new(
            transport.clone(),
            StreamConfig {
                base_url: "ws://feed.test/ws/".to_string(),
                suffix: "".to_string(),
            },
            tuning,
            Arc::clone(&active),
            tx.clone(),
        );
        Arc::clone(&manager).open(btc).await.unwrap();
        let _first = transport.take_conn().await;

        let switcher = spawn_switch_worker(
            Arc::clone(&manager),
            Arc::clone(&active),
            tx,
            Duration::from_millis(10),
        );

        assert!(switcher.request(Arc::clone(&eth)));
        assert!(switcher.request(Arc::clone(&xmr)));
        // Duplicate of the tail request still queues; the worker drops it
        // once xmrbtc is active
        assert!(switcher.request(Arc::clone(&xmr)));

        let second = transport.take_conn().await;
        assert!(second.address.contains("ethusdt"));
        let third = transport.take_conn().await;
        assert!(third.address.contains("xmrbtc"));
        assert_eq!(*active.load_full(), *xmr);

        // The duplicate produced no fourth dial
        sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.connect_count(), 3);

        assert!(!switcher.request(xmr));

        // Reset preceded each switch so the pipeline saw a clear per hop
        let mut resets = 0;
        let deadline = Instant::now() + Duration::from_millis(200);
        while Instant::now() < deadline {
            match rx.try_recv() {
                Ok(PipelineEvent::Reset) => resets += 1,
                Ok(_) => {}
                Err(_) => sleep(Duration::from_millis(5)).await,
            }
        }
        assert_eq!(resets, 2);
    }
}
