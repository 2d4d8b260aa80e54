//! Feed integration tests
//!
//! Run the full gateway against a scripted WebSocket endpoint: real sockets,
//! real reconnects, scripted frames. Tunables are shrunk so lifecycle paths
//! play out in milliseconds.

use depthcast_gateway::{
    ConnectionState, FeedConfig, FeedHandle, FeedTuning, InstrumentConfig, StreamConfig,
    WsTransport,
};
use feed_sim::FeedServer;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

// ============================================================================
// Test Fixtures
// ============================================================================

fn tuning() -> FeedTuning {
    FeedTuning {
        publish_interval_ms: 50,
        connect_timeout_ms: 1_000,
        reconnect_delay_ms: 150,
        heartbeat_interval_ms: 100,
        close_guard_ms: 40,
        switch_settle_ms: 40,
        flood_grace_ms: 100,
        flood_gap_ms: 1_000,
        flood_limit: 30,
    }
}

fn pair(feed_symbol: &str, display_name: &str) -> InstrumentConfig {
    InstrumentConfig {
        feed_symbol: feed_symbol.to_string(),
        display_name: display_name.to_string(),
    }
}

fn test_config(base_url: String) -> FeedConfig {
    FeedConfig {
        instruments: vec![
            pair("btcusdt", "BTC/USDT"),
            pair("ethusdt", "ETH/USDT"),
            pair("xmrbtc", "XMR/BTC"),
        ],
        stream: StreamConfig {
            base_url,
            suffix: "@depth20@1000ms".to_string(),
        },
        tuning: tuning(),
    }
}

fn levels(rows: &[(f64, f64)]) -> Value {
    Value::Array(
        rows.iter()
            .map(|(price, amount)| json!([price.to_string(), amount.to_string()]))
            .collect(),
    )
}

fn snapshot_frame(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> Value {
    json!({
        "lastUpdateId": 87,
        "bids": levels(bids),
        "asks": levels(asks),
    })
}

fn delta_frame(symbol: &str, bids: &[(f64, f64)], asks: &[(f64, f64)]) -> Value {
    json!({
        "e": "depthUpdate",
        "s": symbol.to_uppercase(),
        "b": levels(bids),
        "a": levels(asks),
    })
}

async fn wait_until<F: Fn() -> bool>(cond: F, wait: Duration) -> bool {
    let deadline = Instant::now() + wait;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    cond()
}

// ============================================================================
// Streaming
// ============================================================================

#[tokio::test]
async fn test_streams_updates_and_echoes_heartbeats() {
    let mut sim = FeedServer::start().await.unwrap();
    let handle = FeedHandle::start(test_config(sim.base_url()), WsTransport)
        .await
        .unwrap();

    let conn = sim.next_connection().await.expect("gateway never dialed");
    assert!(conn.path.contains("btcusdt@depth20@1000ms"));

    conn.send_json(&snapshot_frame(&[(100.0, 2.0), (99.5, 1.0)], &[(100.5, 1.0)]));
    assert!(
        wait_until(
            || !handle.latest().book.is_empty(),
            Duration::from_secs(2)
        )
        .await
    );

    let update = handle.latest();
    assert_eq!(update.state, ConnectionState::Connected);
    assert_eq!(update.book.best_bid().unwrap().price, 100.0);
    assert_eq!(update.book.bids[1].total, 3.0);
    assert_eq!(update.book.best_ask().unwrap().price, 100.5);
    assert_eq!(update.imbalance, 0.5);
    assert_eq!(update.spreads.last().unwrap().spread, 0.5);

    // Scheduled keepalives reach the feed
    let ping = conn
        .wait_for_frame(
            |frame| frame.contains(r#""event":"ping""#),
            Duration::from_secs(2),
        )
        .await;
    assert!(ping.is_some());

    // Feed-originated probes get their token echoed back
    conn.send_json(&json!({"ping": 1724}));
    let pong = conn
        .wait_for_frame(|frame| frame.contains("pong"), Duration::from_secs(2))
        .await
        .expect("probe was never echoed");
    let value: Value = serde_json::from_str(&pong).unwrap();
    assert_eq!(value["pong"], json!(1724));

    handle.shutdown();
    assert!(wait_until(|| conn.is_closed(), Duration::from_secs(2)).await);
}

// ============================================================================
// Reconnection
// ============================================================================

#[tokio::test]
async fn test_reconnects_after_abnormal_close() {
    let mut sim = FeedServer::start().await.unwrap();
    let handle = FeedHandle::start(test_config(sim.base_url()), WsTransport)
        .await
        .unwrap();

    let first = sim.next_connection().await.expect("gateway never dialed");
    first.send_json(&snapshot_frame(&[(100.0, 1.0)], &[(100.5, 1.0)]));
    assert!(
        wait_until(
            || !handle.latest().book.is_empty(),
            Duration::from_secs(2)
        )
        .await
    );

    let mut updates = handle.subscribe();
    first.abort();

    // The failure surfaces, then the fixed-delay reconnect heals it
    let mut saw_error = false;
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        let Ok(Some(update)) = timeout(Duration::from_millis(250), updates.next()).await else {
            continue;
        };
        if update.state == ConnectionState::Error {
            saw_error = true;
        }
        if saw_error && update.state == ConnectionState::Connected {
            break;
        }
    }
    assert!(saw_error);

    let second = sim.next_connection().await.expect("no reconnect arrived");
    assert!(second.path.contains("btcusdt"));

    second.send_json(&snapshot_frame(&[(101.0, 1.0)], &[(101.5, 1.0)]));
    assert!(
        wait_until(
            || handle.latest().book.best_bid().map(|level| level.price) == Some(101.0),
            Duration::from_secs(2)
        )
        .await
    );
    handle.shutdown();
}

#[tokio::test]
async fn test_dead_endpoint_reports_error_state() {
    // Nothing listens on the discard port, so every dial is refused
    let config = test_config("ws://127.0.0.1:9/ws/".to_string());
    let handle = FeedHandle::start(config, WsTransport).await.unwrap();

    assert!(
        wait_until(
            || handle.state() == ConnectionState::Error,
            Duration::from_secs(3)
        )
        .await
    );
    assert_eq!(handle.latest().state, ConnectionState::Error);

    handle.shutdown();
    assert_eq!(handle.state(), ConnectionState::Disconnected);
}

// ============================================================================
// Instrument Switching
// ============================================================================

#[tokio::test]
async fn test_switches_apply_in_request_order() {
    let mut sim = FeedServer::start().await.unwrap();
    let handle = FeedHandle::start(test_config(sim.base_url()), WsTransport)
        .await
        .unwrap();
    let first = sim.next_connection().await.expect("gateway never dialed");
    assert!(first.path.contains("btcusdt"));

    assert!(handle.switch_to("ethusdt").unwrap());
    assert!(handle.switch_to("xmrbtc").unwrap());

    let second = sim.next_connection().await.expect("first switch never dialed");
    assert!(second.path.contains("ethusdt"));
    let third = sim.next_connection().await.expect("second switch never dialed");
    assert!(third.path.contains("xmrbtc"));

    assert_eq!(handle.current_instrument().feed_symbol, "xmrbtc");
    assert!(matches!(handle.switch_to("xmrbtc"), Ok(false)));

    // Prices on the new stream flow through the new instrument's scaling
    third.send_json(&snapshot_frame(&[(45000.0, 1.0)], &[(45200.0, 1.0)]));
    assert!(
        wait_until(
            || handle.latest().book.best_bid().map(|level| level.price) == Some(1.125),
            Duration::from_secs(2)
        )
        .await
    );
    assert_eq!(handle.latest().instrument.feed_symbol, "xmrbtc");
    handle.shutdown();
}

#[tokio::test]
async fn test_scaled_instrument_from_startup() {
    let mut sim = FeedServer::start().await.unwrap();
    let mut config = test_config(sim.base_url());
    config.instruments.rotate_right(1); // xmrbtc first
    let handle = FeedHandle::start(config, WsTransport).await.unwrap();

    let conn = sim.next_connection().await.expect("gateway never dialed");
    assert!(conn.path.contains("xmrbtc"));

    conn.send_json(&snapshot_frame(&[(45000.0, 0.5)], &[(45200.0, 0.25)]));
    assert!(
        wait_until(
            || !handle.latest().book.is_empty(),
            Duration::from_secs(2)
        )
        .await
    );
    let book = handle.latest().book;
    assert_eq!(book.best_bid().unwrap().price, 1.125);
    assert_eq!(book.best_ask().unwrap().price, 1.13);
    handle.shutdown();
}

// ============================================================================
// Flood Handling
// ============================================================================

#[tokio::test]
async fn test_flood_forces_a_reconnect_cycle() {
    let mut sim = FeedServer::start().await.unwrap();
    let handle = FeedHandle::start(test_config(sim.base_url()), WsTransport)
        .await
        .unwrap();
    let first = sim.next_connection().await.expect("gateway never dialed");

    // Far past the configured limit of thirty back-to-back frames
    for i in 0..40 {
        let price = 100.0 + f64::from(i);
        first.send_json(&delta_frame(
            "btcusdt",
            &[(price, 1.0)],
            &[(price + 0.5, 1.0)],
        ));
    }

    let second = sim
        .next_connection()
        .await
        .expect("flood never cycled the connection");
    assert!(second.path.contains("btcusdt"));
    assert!(wait_until(|| first.is_closed(), Duration::from_secs(2)).await);
    assert!(
        wait_until(
            || handle.state() == ConnectionState::Connected,
            Duration::from_secs(2)
        )
        .await
    );
    handle.shutdown();
}
