//! Raw level list processing and display aggregation
//!
//! Every feed message carries complete bid/ask level lists that replace the
//! visible book. Processing validates and normalizes the raw pairs into
//! `PriceLevel`s; aggregation turns a processed side into display-ready rows
//! with running depth totals and per-rank amount deltas.

use crate::instrument::Instrument;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of levels kept per book side
pub const BOOK_DEPTH: usize = 20;

/// Feed symbol whose stream ships prices pre-multiplied by 40000
pub const SCALED_FEED_SYMBOL: &str = "xmrbtc";
const SCALED_PRICE_THRESHOLD: f64 = 1000.0;
const SCALED_PRICE_DIVISOR: f64 = 40000.0;

/// A single validated price level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub amount: f64,
}

impl PriceLevel {
    pub fn new(price: f64, amount: f64) -> Self {
        PriceLevel { price, amount }
    }
}

/// A display-ready level: running depth total plus the amount delta against
/// whatever held the same rank in the previous view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedLevel {
    pub price: f64,
    pub amount: f64,
    /// Cumulative amount from the best price through this level
    pub total: f64,
    /// Amount delta vs. the same rank in the previous view; 0 for new ranks
    pub change: f64,
}

/// Undo the scaling quirk on the affected stream: raw prices above the
/// threshold arrive multiplied by 40000 and are divided back. Every other
/// instrument passes through untouched.
pub fn normalize_price(price: f64, instrument: &Instrument) -> f64 {
    if instrument.feed_symbol == SCALED_FEED_SYMBOL && price > SCALED_PRICE_THRESHOLD {
        price / SCALED_PRICE_DIVISOR
    } else {
        price
    }
}

/// Validate a raw level list into at most [`BOOK_DEPTH`] levels, sorted by
/// descending price.
///
/// Entries are rejected individually, never the whole batch: anything that is
/// not a two-field pair, fails to parse as a float, or ends up non-finite or
/// negative after normalization is skipped. Non-sequence input yields an
/// empty list. Duplicate prices are kept as distinct levels.
pub fn process_levels(raw: &Value, instrument: &Instrument) -> Vec<PriceLevel> {
    let Some(entries) = raw.as_array() else {
        return Vec::new();
    };

    let mut levels: Vec<PriceLevel> = entries
        .iter()
        .filter_map(|entry| parse_level(entry, instrument))
        .collect();

    levels.sort_by(|a, b| b.price.total_cmp(&a.price));
    levels.truncate(BOOK_DEPTH);
    levels
}

fn parse_level(entry: &Value, instrument: &Instrument) -> Option<PriceLevel> {
    let fields = entry.as_array()?;
    if fields.len() != 2 {
        return None;
    }

    let price = normalize_price(field_as_f64(&fields[0])?, instrument);
    let amount = field_as_f64(&fields[1])?;

    if !price.is_finite() || price < 0.0 || !amount.is_finite() || amount < 0.0 {
        return None;
    }

    Some(PriceLevel { price, amount })
}

/// The feed quotes prices and amounts as strings, but plain numbers appear
/// in some shapes; accept both.
fn field_as_f64(field: &Value) -> Option<f64> {
    match field {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Aggregate one processed side into display rows.
///
/// `previous` is the same side from the last published view; deltas are
/// computed by rank, not by price. A non-finite amount contributes nothing
/// to the running total and reports a zero change.
pub fn aggregate_levels(levels: &[PriceLevel], previous: &[AggregatedLevel]) -> Vec<AggregatedLevel> {
    let mut total = 0.0;
    levels
        .iter()
        .enumerate()
        .map(|(rank, level)| {
            let finite = level.amount.is_finite();
            if finite {
                total += level.amount;
            }
            let change = match previous.get(rank) {
                Some(prior) if finite => level.amount - prior.amount,
                _ => 0.0,
            };
            AggregatedLevel {
                price: level.price,
                amount: level.amount,
                total,
                change,
            }
        })
        .collect()
}
