pub mod book;
pub mod instrument;
pub mod levels;
pub mod spread;

// Re-export the domain types at crate root for convenience
pub use book::OrderBookSnapshot;
pub use instrument::Instrument;
pub use levels::{
    AggregatedLevel, BOOK_DEPTH, PriceLevel, SCALED_FEED_SYMBOL, aggregate_levels,
    normalize_price, process_levels,
};
pub use spread::{SPREAD_HISTORY_CAPACITY, SpreadHistory, SpreadSample};
