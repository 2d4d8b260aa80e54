//! Feed assembly and the consumer-facing handle

use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use depthcast_core::Instrument;

use crate::application::connection::ConnectionManager;
use crate::application::pipeline::Pipeline;
use crate::application::switcher::{InstrumentSwitcher, spawn_switch_worker};
use crate::config::{ConfigError, FeedConfig};
use crate::domain::ConnectionState;
use crate::error::FeedError;
use crate::infrastructure::Transport;
use crate::presentation::{
    MarketUpdate, UPDATE_CHANNEL_CAPACITY, UpdatePublisher, UpdateStream,
};

/// Running feed client. Dropping the handle does not stop the feed; call
/// [`FeedHandle::shutdown`] for that.
pub struct FeedHandle<T: Transport> {
    config: Arc<FeedConfig>,
    manager: Arc<ConnectionManager<T>>,
    publisher: Arc<UpdatePublisher>,
    switcher: InstrumentSwitcher,
    active: Arc<ArcSwap<Instrument>>,
    pipeline_task: JoinHandle<()>,
}

impl<T: Transport> FeedHandle<T> {
    /// Wire the pipeline, switch worker and connection manager together and
    /// kick off the connect to the catalog's first instrument. Returns as
    /// soon as everything is running; the connect itself proceeds in the
    /// background and failures surface as state updates.
    pub async fn start(config: FeedConfig, transport: T) -> Result<Self, FeedError> {
        config.validate()?;
        let startup = config
            .startup_instrument()
            .ok_or(FeedError::Config(ConfigError::NoInstruments))?;
        let startup = Arc::new(startup);
        let active = Arc::new(ArcSwap::from(Arc::clone(&startup)));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let publisher = Arc::new(UpdatePublisher::new(
            UPDATE_CHANNEL_CAPACITY,
            MarketUpdate::empty(Arc::clone(&startup), ConnectionState::Disconnected),
        ));

        let manager = ConnectionManager::new(
            transport,
            config.stream.clone(),
            config.tuning.clone(),
            Arc::clone(&active),
            event_tx.clone(),
        );

        let pipeline = Pipeline::new(
            Arc::clone(&manager),
            Arc::clone(&publisher),
            Arc::clone(&active),
            &config.tuning,
        );
        let pipeline_task = tokio::spawn(pipeline.run(event_rx));

        let switcher = spawn_switch_worker(
            Arc::clone(&manager),
            Arc::clone(&active),
            event_tx,
            config.tuning.switch_settle(),
        );

        let opener = Arc::clone(&manager);
        tokio::spawn(async move {
            if let Err(e) = opener.open(startup).await {
                warn!("startup connect failed: {}", e);
            }
        });

        Ok(FeedHandle {
            config: Arc::new(config),
            manager,
            publisher,
            switcher,
            active,
            pipeline_task,
        })
    }

    /// Live stream of published updates
    pub fn subscribe(&self) -> UpdateStream {
        self.publisher.subscribe()
    }

    /// Most recently published update, available without subscribing
    pub fn latest(&self) -> MarketUpdate {
        self.publisher.latest()
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn current_instrument(&self) -> Arc<Instrument> {
        self.active.load_full()
    }

    /// The configured instrument catalog
    pub fn instruments(&self) -> Vec<Instrument> {
        self.config
            .instruments
            .iter()
            .map(|entry| entry.to_instrument())
            .collect()
    }

    /// Switch to a catalog instrument by feed symbol. Ok(false) means the
    /// instrument was already active and nothing was queued.
    pub fn switch_to(&self, feed_symbol: &str) -> Result<bool, FeedError> {
        let instrument = self
            .config
            .instrument(feed_symbol)
            .ok_or_else(|| FeedError::UnknownInstrument(feed_symbol.to_string()))?;
        Ok(self.switcher.request(Arc::new(instrument)))
    }

    /// Switch to an instrument outside the catalog
    pub fn request_switch(&self, instrument: Instrument) -> bool {
        self.switcher.request(Arc::new(instrument))
    }

    /// Close the connection for good and stop the pipeline
    pub fn shutdown(&self) {
        self.manager.close();
        self.pipeline_task.abort();
    }
}
