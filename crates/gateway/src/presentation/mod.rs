//! Outbound surface for display consumers

pub mod publisher;

pub use publisher::{MarketUpdate, UPDATE_CHANNEL_CAPACITY, UpdatePublisher, UpdateStream};
