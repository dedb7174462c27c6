//! spread-sentry entry point
//!
//! Orchestrates:
//! 1. Config + logging initialization
//! 2. Shared state (cache, histories, monitoring, relay)
//! 3. FeedManager → all price feeds
//! 4. Spread evaluator + periodic broadcast
//! 5. axum relay server
//! 6. Ctrl+C graceful shutdown

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tracing::{error, info};

use spread_sentry::adapters::FeedManager;
use spread_sentry::config::constants::{config_path, feed_request_timeout, log_configuration};
use spread_sentry::config::{init_logging, load_config};
use spread_sentry::core::{
    run_evaluator, run_periodic_broadcast, FeedContext, HistoryBuffer, MonitoringRegistry,
    PriceCache, SpreadEvaluator,
};
use spread_sentry::server::{self, AppState, BroadcastRelay};

/// Time granted to tasks after the shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // =========================================================================
    // 1. Config + logging
    // =========================================================================
    dotenvy::dotenv().ok();

    let path = config_path();
    let config = load_config(Path::new(&path))?;

    // The relay exists before logging so log lines reach subscribers
    let relay = Arc::new(BroadcastRelay::new(config.relay.queue_capacity));
    init_logging(Some(Arc::clone(&relay)));

    info!("=== spread-sentry ===");
    log_configuration();
    info!(
        path = %path,
        feeds = config.feeds.len(),
        pairs = config.evaluator.pairs.len(),
        "Config loaded"
    );

    // =========================================================================
    // 2. Shared state
    // =========================================================================
    let cache = Arc::new(PriceCache::new());
    let monitors = Arc::new(MonitoringRegistry::new());
    let price_history = Arc::new(Mutex::new(HistoryBuffer::new(config.monitoring.price_history)));
    let spread_history = Arc::new(Mutex::new(HistoryBuffer::new(config.monitoring.spread_history)));
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let ctx = FeedContext::new(
        Arc::clone(&cache),
        Arc::clone(&relay),
        Arc::clone(&price_history),
        Arc::clone(&monitors),
    );

    // =========================================================================
    // 3. Price feeds
    // =========================================================================
    let manager = FeedManager::from_config(&config.feeds, ctx, feed_request_timeout())?;
    let mut handles: Vec<_> = manager.spawn_all(&shutdown_tx).into_values().collect();

    // =========================================================================
    // 4. Evaluator + periodic broadcast
    // =========================================================================
    if config.evaluator.pairs.is_empty() {
        info!("No spread pairs configured, evaluator disabled");
    } else {
        handles.push(tokio::spawn(run_evaluator(
            SpreadEvaluator::new(config.evaluator.pairs.clone()),
            Arc::clone(&cache),
            Arc::clone(&relay),
            Arc::clone(&spread_history),
            Arc::clone(&monitors),
            Duration::from_secs(config.evaluator.interval_secs),
            shutdown_tx.subscribe(),
        )));
    }

    handles.push(tokio::spawn(run_periodic_broadcast(
        Arc::clone(&cache),
        Arc::clone(&relay),
        Arc::clone(&monitors),
        Duration::from_secs(config.monitoring.interval_secs),
        shutdown_tx.subscribe(),
    )));

    // =========================================================================
    // 5. Relay server
    // =========================================================================
    let state = AppState {
        relay: Arc::clone(&relay),
        cache,
        price_history,
        spread_history,
        monitors,
        rebroadcast_inbound: config.relay.rebroadcast_inbound,
        shutdown: shutdown_tx.clone(),
    };
    let host = config.relay.host.clone();
    let port = config.relay.port;

    handles.push(tokio::spawn(async move {
        if let Err(e) = server::start_server(state, &host, port).await {
            error!(error = %e, "Relay server failed");
        }
    }));

    info!("WebSocket endpoint: ws://{}:{}/ws", config.relay.host, port);
    info!("Press Ctrl+C to shutdown");

    // =========================================================================
    // 6. Wait for Ctrl+C → graceful shutdown
    // =========================================================================
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());

    let join_all = futures_util::future::join_all(handles);
    if tokio::time::timeout(SHUTDOWN_GRACE, join_all).await.is_err() {
        error!("Tasks did not stop within the grace period");
    }

    info!("Shutdown complete");
    Ok(())
}
