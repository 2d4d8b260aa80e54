pub mod events;
pub mod state;

pub use events::{PipelineEvent, RoutedEvent};
pub use state::{ConnectionEpoch, ConnectionState};
