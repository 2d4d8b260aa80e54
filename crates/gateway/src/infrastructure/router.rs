use serde_json::Value;
use tracing::{debug, trace};

use depthcast_core::Instrument;

use crate::domain::RoutedEvent;

/// Classify one inbound frame against the active instrument.
///
/// Three shapes are recognized: a heartbeat probe, a symbol-tagged depth
/// delta, and an untagged full snapshot. Tagged frames for another
/// instrument and untagged frames from another instrument's stream address
/// are dropped. Anything unrecognized or unparseable yields None; bad input
/// never propagates an error.
pub fn route(raw: &str, active: &Instrument, address: &str) -> Option<RoutedEvent> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            debug!("unparseable frame dropped: {}", e);
            return None;
        }
    };

    if let Some(event) = parse_heartbeat(&value) {
        return Some(event);
    }
    if let Some(event) = parse_delta(&value, active) {
        return Some(event);
    }
    if let Some(event) = parse_snapshot(&value, active, address) {
        return Some(event);
    }

    trace!("frame matched no known shape");
    None
}

fn parse_heartbeat(value: &Value) -> Option<RoutedEvent> {
    let token = value.as_object()?.get("ping")?;
    Some(RoutedEvent::HeartbeatEcho {
        token: token.clone(),
    })
}

fn parse_delta(value: &Value, active: &Instrument) -> Option<RoutedEvent> {
    if value.get("e")?.as_str()? != "depthUpdate" {
        return None;
    }
    let symbol = value.get("s")?.as_str()?;
    if !active.matches_tag(symbol) {
        debug!(
            "delta for {} dropped while {} is active",
            symbol, active.feed_symbol
        );
        return None;
    }
    Some(RoutedEvent::Delta {
        bids: value.get("b")?.clone(),
        asks: value.get("a")?.clone(),
    })
}

fn parse_snapshot(value: &Value, active: &Instrument, address: &str) -> Option<RoutedEvent> {
    value.get("lastUpdateId")?;
    // Snapshot frames carry no symbol tag; a tagged frame is not one
    if value.get("s").is_some() {
        return None;
    }
    // An untagged frame is attributed through the address it arrived on
    if !address.to_lowercase().contains(&active.feed_symbol) {
        debug!(
            "snapshot from {} dropped while {} is active",
            address, active.feed_symbol
        );
        return None;
    }
    Some(RoutedEvent::Snapshot {
        bids: value.get("bids")?.clone(),
        asks: value.get("asks")?.clone(),
    })
}
