//! Quote ingestion, per-source monitoring and the periodic rebroadcast.
//!
//! Every adapter hands its quotes to a [`FeedContext`], which validates
//! them, writes them to the cache and history, and publishes `price` and
//! `monitoring` events on the relay.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::core::cache::PriceCache;
use crate::core::history::HistoryBuffer;
use crate::core::types::{
    current_time_ms, MonitoringData, MonitoringUpdate, PriceQuote, RelayEvent,
};
use crate::server::relay::BroadcastRelay;

/// Latest monitoring record per source.
#[derive(Debug, Default)]
pub struct MonitoringRegistry {
    records: RwLock<HashMap<String, MonitoringData>>,
}

impl MonitoringRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, source: &str, latency: Duration) -> MonitoringUpdate {
        let data = MonitoringData {
            latency: latency.as_millis() as u64,
            last_update: current_time_ms(),
        };
        self.records.write().await.insert(source.to_string(), data);
        MonitoringUpdate {
            exchange: source.to_string(),
            data,
        }
    }

    pub async fn get(&self, source: &str) -> Option<MonitoringData> {
        self.records.read().await.get(source).copied()
    }

    /// All records, sorted by source.
    pub async fn snapshot(&self) -> Vec<MonitoringUpdate> {
        let guard = self.records.read().await;
        let mut out: Vec<MonitoringUpdate> = guard
            .iter()
            .map(|(exchange, data)| MonitoringUpdate {
                exchange: exchange.clone(),
                data: *data,
            })
            .collect();
        drop(guard);
        out.sort_by(|a, b| a.exchange.cmp(&b.exchange));
        out
    }
}

/// Shared sink for quotes produced by feed adapters.
#[derive(Clone)]
pub struct FeedContext {
    pub cache: Arc<PriceCache>,
    pub relay: Arc<BroadcastRelay>,
    pub price_history: Arc<Mutex<HistoryBuffer<PriceQuote>>>,
    pub monitors: Arc<MonitoringRegistry>,
}

impl FeedContext {
    pub fn new(
        cache: Arc<PriceCache>,
        relay: Arc<BroadcastRelay>,
        price_history: Arc<Mutex<HistoryBuffer<PriceQuote>>>,
        monitors: Arc<MonitoringRegistry>,
    ) -> Self {
        Self {
            cache,
            relay,
            price_history,
            monitors,
        }
    }

    /// Accept a quote from an adapter.
    ///
    /// Non-finite or non-positive prices are dropped and leave the cache
    /// untouched. Returns whether the quote was accepted.
    pub async fn publish_quote(&self, quote: PriceQuote, latency: Duration) -> bool {
        if !quote.is_usable() {
            warn!(
                source = %quote.source,
                pair = %quote.pair,
                price = quote.price,
                "Discarding unusable quote"
            );
            return false;
        }

        debug!(source = %quote.source, pair = %quote.pair, price = quote.price, "Quote received");

        self.cache.update(quote.clone()).await;
        self.price_history.lock().await.push(quote.clone());

        let source = quote.source.clone();
        self.relay.publish(RelayEvent::Price(quote));

        let update = self.monitors.record(&source, latency).await;
        self.relay.publish(RelayEvent::Monitoring(update));
        true
    }
}

/// Rebroadcast every cached price and monitoring record on a fixed interval
/// so that late subscribers catch up without a replay log.
pub async fn run_periodic_broadcast(
    cache: Arc<PriceCache>,
    relay: Arc<BroadcastRelay>,
    monitors: Arc<MonitoringRegistry>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    // First tick fires immediately; nothing is cached yet.
    ticker.tick().await;

    info!(interval_secs = period.as_secs(), "Periodic broadcast started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (prices, records) = broadcast_snapshot(&cache, &relay, &monitors).await;
                debug!(prices, records, subscribers = relay.subscriber_count(), "Periodic broadcast");
            }
            _ = shutdown.recv() => {
                info!("Periodic broadcast stopped");
                break;
            }
        }
    }
}

/// Publish the current cache and monitoring snapshot once.
/// Returns `(prices, monitoring records)` published.
pub async fn broadcast_snapshot(
    cache: &PriceCache,
    relay: &BroadcastRelay,
    monitors: &MonitoringRegistry,
) -> (usize, usize) {
    let quotes = cache.snapshot().await;
    let records = monitors.snapshot().await;
    let counts = (quotes.len(), records.len());

    for quote in quotes {
        relay.publish(RelayEvent::Price(quote));
    }
    for record in records {
        relay.publish(RelayEvent::Monitoring(record));
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{EventKind, RelayEnvelope};

    fn make_context() -> FeedContext {
        FeedContext::new(
            Arc::new(PriceCache::new()),
            Arc::new(BroadcastRelay::new(16)),
            Arc::new(Mutex::new(HistoryBuffer::new(4))),
            Arc::new(MonitoringRegistry::new()),
        )
    }

    fn decode(raw: &str) -> RelayEnvelope {
        serde_json::from_str(raw).unwrap()
    }

    #[tokio::test]
    async fn test_publish_quote_updates_cache_and_relays() {
        let ctx = make_context();
        let mut sub = ctx.relay.subscribe();

        let accepted = ctx
            .publish_quote(PriceQuote::new("Coinbase", "BTC/USD", 94850.0), Duration::from_millis(42))
            .await;
        assert!(accepted);

        assert_eq!(ctx.cache.get("Coinbase", "BTC/USD").await.unwrap().price, 94850.0);
        assert_eq!(ctx.price_history.lock().await.len(), 1);

        let price = decode(&sub.rx.recv().await.unwrap());
        assert_eq!(price.kind, EventKind::Price);
        let monitoring = decode(&sub.rx.recv().await.unwrap());
        assert_eq!(monitoring.kind, EventKind::Monitoring);
        assert_eq!(monitoring.message["exchange"], "Coinbase");
        assert_eq!(monitoring.message["data"]["latency"], 42);
    }

    #[tokio::test]
    async fn test_unusable_quote_leaves_cache_untouched() {
        let ctx = make_context();
        ctx.publish_quote(PriceQuote::new("Kraken", "BTC/USD", 95000.0), Duration::ZERO).await;

        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let accepted = ctx
                .publish_quote(PriceQuote::new("Kraken", "BTC/USD", bad), Duration::ZERO)
                .await;
            assert!(!accepted);
        }
        assert_eq!(ctx.cache.get("Kraken", "BTC/USD").await.unwrap().price, 95000.0);
        assert_eq!(ctx.price_history.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_snapshot_sends_everything() {
        let ctx = make_context();
        ctx.publish_quote(PriceQuote::new("Kraken", "BTC/USD", 95000.0), Duration::ZERO).await;
        ctx.publish_quote(PriceQuote::new("Coinbase", "BTC/USD", 94850.0), Duration::ZERO).await;

        let mut sub = ctx.relay.subscribe();
        let (prices, records) = broadcast_snapshot(&ctx.cache, &ctx.relay, &ctx.monitors).await;
        assert_eq!((prices, records), (2, 2));

        let mut kinds = Vec::new();
        while let Ok(raw) = sub.rx.try_recv() {
            kinds.push(decode(&raw).kind);
        }
        assert_eq!(
            kinds,
            vec![EventKind::Price, EventKind::Price, EventKind::Monitoring, EventKind::Monitoring]
        );
    }

    #[tokio::test]
    async fn test_registry_snapshot_sorted() {
        let registry = MonitoringRegistry::new();
        registry.record("PancakeSwap", Duration::from_millis(300)).await;
        registry.record("Kraken", Duration::from_millis(5)).await;

        let names: Vec<String> = registry.snapshot().await.into_iter().map(|r| r.exchange).collect();
        assert_eq!(names, vec!["Kraken", "PancakeSwap"]);
        assert_eq!(registry.get("Kraken").await.unwrap().latency, 5);
    }

    #[tokio::test]
    async fn test_periodic_broadcast_repeats_snapshot_until_shutdown() {
        let ctx = FeedContext::new(
            Arc::new(PriceCache::new()),
            Arc::new(BroadcastRelay::new(64)),
            Arc::new(Mutex::new(HistoryBuffer::new(4))),
            Arc::new(MonitoringRegistry::new()),
        );
        ctx.publish_quote(PriceQuote::new("Kraken", "BTC/USD", 95000.0), Duration::from_millis(7))
            .await;
        let mut sub = ctx.relay.subscribe();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(run_periodic_broadcast(
            ctx.cache.clone(),
            ctx.relay.clone(),
            ctx.monitors.clone(),
            Duration::from_millis(20),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(110)).await;
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("periodic broadcast did not stop")
            .unwrap();

        let envelopes: Vec<RelayEnvelope> =
            std::iter::from_fn(|| sub.rx.try_recv().ok()).map(|raw| decode(&raw)).collect();
        let prices = envelopes.iter().filter(|e| e.kind == EventKind::Price).count();
        let records = envelopes.iter().filter(|e| e.kind == EventKind::Monitoring).count();
        assert!(prices >= 2, "got {} price envelopes", prices);
        assert_eq!(prices, records);
        assert_eq!(envelopes[0].message["exchange"], "Kraken");
    }
}
