//! Use-case layer: connection lifecycle, the event pipeline, switching and
//! the publish/flood gates

pub mod connection;
pub mod feed;
pub mod pipeline;
pub mod switcher;
pub mod throttle;

pub use connection::ConnectionManager;
pub use feed::FeedHandle;
pub use pipeline::Pipeline;
pub use switcher::{InstrumentSwitcher, spawn_switch_worker};
pub use throttle::{FloodGuard, FloodVerdict, UpdateThrottle};
