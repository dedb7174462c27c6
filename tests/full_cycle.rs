//! End-to-End Integration Tests
//!
//! Covers the full quote path:
//! 1. Feed context → cache → evaluator → relay
//! 2. A real WebSocket subscriber against the axum relay server
//! 3. Inbound envelope rebroadcast and HTTP snapshots
//!
//! # Running the tests
//! ```bash
//! cargo test --test full_cycle
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tokio_tungstenite::tungstenite::Message;

use spread_sentry::core::evaluator::publish_cycle;
use spread_sentry::core::{
    EventKind, FeedContext, HistoryBuffer, MonitoringRegistry, PriceCache, PriceQuote, PriceRef,
    RelayEnvelope, RelayEvent, SpreadEvaluator, SpreadPairConfig, SpreadSample,
};
use spread_sentry::server::{self, AppState, BroadcastRelay};

// =============================================================================
// Helpers
// =============================================================================

struct Harness {
    ctx: FeedContext,
    spreads: Arc<Mutex<HistoryBuffer<SpreadSample>>>,
}

fn harness() -> Harness {
    let ctx = FeedContext::new(
        Arc::new(PriceCache::new()),
        Arc::new(BroadcastRelay::new(64)),
        Arc::new(Mutex::new(HistoryBuffer::new(100))),
        Arc::new(MonitoringRegistry::new()),
    );
    Harness {
        ctx,
        spreads: Arc::new(Mutex::new(HistoryBuffer::new(100))),
    }
}

fn kraken_coinbase() -> SpreadEvaluator {
    SpreadEvaluator::new(vec![SpreadPairConfig {
        name: "BTC/USD".into(),
        leg_a: PriceRef::direct("Kraken", "BTC/USD"),
        leg_b: PriceRef::direct("Coinbase", "BTC/USD"),
        threshold: 100.0,
    }])
}

fn drain(rx: &mut tokio::sync::mpsc::Receiver<Arc<str>>) -> Vec<RelayEnvelope> {
    let mut out = Vec::new();
    while let Ok(raw) = rx.try_recv() {
        out.push(serde_json::from_str(&raw).unwrap());
    }
    out
}

async fn start_relay(h: &Harness) -> (String, broadcast::Sender<()>) {
    let (shutdown_tx, _) = broadcast::channel(1);
    let state = AppState {
        relay: Arc::clone(&h.ctx.relay),
        cache: Arc::clone(&h.ctx.cache),
        price_history: Arc::clone(&h.ctx.price_history),
        spread_history: Arc::clone(&h.spreads),
        monitors: Arc::clone(&h.ctx.monitors),
        rebroadcast_inbound: true,
        shutdown: shutdown_tx.clone(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(listener, state));

    (format!("127.0.0.1:{}", addr.port()), shutdown_tx)
}

async fn wait_for_subscribers(relay: &BroadcastRelay, n: usize) {
    for _ in 0..200 {
        if relay.subscriber_count() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("subscriber never registered");
}

// =============================================================================
// Pipeline
// =============================================================================

#[tokio::test]
async fn test_quotes_to_opportunity_over_relay() {
    let h = harness();
    let mut sub = h.ctx.relay.subscribe();

    h.ctx
        .publish_quote(PriceQuote::new("Kraken", "BTC/USD", 95000.0), Duration::from_millis(3))
        .await;
    h.ctx
        .publish_quote(PriceQuote::new("Coinbase", "BTC/USD", 94850.0), Duration::from_millis(120))
        .await;

    let cycle = kraken_coinbase().evaluate(&h.ctx.cache).await;
    publish_cycle(&cycle, &h.ctx.relay, &h.spreads).await;

    let kinds: Vec<EventKind> = drain(&mut sub.rx).iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Price,
            EventKind::Monitoring,
            EventKind::Price,
            EventKind::Monitoring,
            EventKind::Spread,
            EventKind::Opportunity,
        ]
    );

    let opp = &cycle.opportunities[0];
    assert_eq!(opp.spread, 150.0);
    assert_eq!(opp.buy_source, "Coinbase");
    assert_eq!(opp.sell_source, "Kraken");
    assert_eq!(h.spreads.lock().await.len(), 1);
}

#[tokio::test]
async fn test_missing_leg_emits_nothing() {
    let h = harness();
    h.ctx
        .publish_quote(PriceQuote::new("Coinbase", "BTC/USD", 94850.0), Duration::ZERO)
        .await;
    let mut sub = h.ctx.relay.subscribe();

    let cycle = kraken_coinbase().evaluate(&h.ctx.cache).await;
    publish_cycle(&cycle, &h.ctx.relay, &h.spreads).await;

    assert!(cycle.samples.is_empty());
    assert!(cycle.opportunities.is_empty());
    assert!(drain(&mut sub.rx).is_empty());
}

#[tokio::test]
async fn test_unusable_quote_leaves_cache_untouched() {
    let h = harness();
    h.ctx
        .publish_quote(PriceQuote::new("Kraken", "BTC/USD", 95000.0), Duration::ZERO)
        .await;
    let accepted = h
        .ctx
        .publish_quote(PriceQuote::new("Kraken", "BTC/USD", 0.0), Duration::ZERO)
        .await;

    assert!(!accepted);
    assert_eq!(h.ctx.cache.get("Kraken", "BTC/USD").await.unwrap().price, 95000.0);
}

// =============================================================================
// Relay server
// =============================================================================

#[tokio::test]
async fn test_websocket_subscriber_receives_events() {
    let h = harness();
    let (addr, shutdown) = start_relay(&h).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();
    wait_for_subscribers(&h.ctx.relay, 1).await;

    h.ctx
        .relay
        .publish(RelayEvent::Price(PriceQuote::new("Kraken", "BTC/USD", 95000.0)));

    let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = match frame {
        Message::Text(t) => t,
        other => panic!("unexpected frame {:?}", other),
    };
    let envelope: RelayEnvelope = serde_json::from_str(&text).unwrap();
    assert_eq!(envelope.kind, EventKind::Price);
    assert_eq!(envelope.message["exchange"], "Kraken");
    assert_eq!(envelope.message["price"], 95000.0);
    assert!(envelope.timestamp.ends_with('Z'));

    // Disconnect is noticed and the subscriber pruned
    ws.close(None).await.unwrap();
    for _ in 0..200 {
        if h.ctx.relay.subscriber_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.ctx.relay.subscriber_count(), 0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_inbound_envelope_echoed_to_all_subscribers() {
    let h = harness();
    let (addr, shutdown) = start_relay(&h).await;

    let (mut sender, _) = tokio_tungstenite::connect_async(format!("ws://{}/", addr))
        .await
        .unwrap();
    let (mut listener, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();
    wait_for_subscribers(&h.ctx.relay, 2).await;

    let frame = r#"{"type":"log","message":"sibling bot online","timestamp":"2025-01-01T00:00:00.000Z"}"#;
    sender.send(Message::Text(frame.to_string())).await.unwrap();

    for ws in [&mut listener, &mut sender] {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let envelope: RelayEnvelope = serde_json::from_str(msg.to_text().unwrap()).unwrap();
        assert_eq!(envelope.kind, EventKind::Log);
        assert_eq!(envelope.message, "sibling bot online");
    }

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_http_snapshots() {
    let h = harness();
    h.ctx
        .publish_quote(PriceQuote::new("Kraken", "BTC/USD", 95000.0), Duration::from_millis(7))
        .await;
    let (addr, shutdown) = start_relay(&h).await;
    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["prices"], 1);
    assert!(health["dropped_logs"].is_u64(), "got {}", health);

    let prices: serde_json::Value = client
        .get(format!("http://{}/api/prices", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(prices[0]["exchange"], "Kraken");
    assert_eq!(prices[0]["pair"], "BTC/USD");

    let monitoring: serde_json::Value = client
        .get(format!("http://{}/api/monitoring", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(monitoring[0]["exchange"], "Kraken");
    assert_eq!(monitoring[0]["data"]["latency"], 7);

    let spreads: serde_json::Value = client
        .get(format!("http://{}/api/spreads?limit=5", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(spreads, serde_json::json!([]));

    let _ = shutdown.send(());
}
