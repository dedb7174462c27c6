//! Relay server: WebSocket fan-out plus a few read-only HTTP snapshots.
//!
//! Uses `axum` for HTTP/WS routing with CORS support.

pub mod log_layer;
pub mod relay;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::core::cache::PriceCache;
use crate::core::history::HistoryBuffer;
use crate::core::monitoring::MonitoringRegistry;
use crate::core::types::{current_time_ms, MonitoringUpdate, PriceQuote, SpreadSample};
use crate::error::AppError;

pub use log_layer::RelayLogLayer;
pub use relay::{BroadcastRelay, Subscription};

/// Shared application state for the HTTP/WS server.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<BroadcastRelay>,
    pub cache: Arc<PriceCache>,
    pub price_history: Arc<Mutex<HistoryBuffer<PriceQuote>>>,
    pub spread_history: Arc<Mutex<HistoryBuffer<SpreadSample>>>,
    pub monitors: Arc<MonitoringRegistry>,
    /// Re-publish envelopes received from subscribers
    pub rebroadcast_inbound: bool,
    /// Closes open WebSocket connections on shutdown
    pub shutdown: broadcast::Sender<()>,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws::ws_handler))
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health_handler))
        .route("/api/prices", get(prices_handler))
        .route("/api/prices/history", get(price_history_handler))
        .route("/api/spreads", get(spreads_handler))
        .route("/api/monitoring", get(monitoring_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `host:port` and serve until a shutdown signal arrives.
pub async fn start_server(state: AppState, host: &str, port: u16) -> Result<(), AppError> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    serve(listener, state).await
}

/// Serve on an already bound listener (port 0 in tests).
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), AppError> {
    let mut shutdown = state.shutdown.subscribe();
    info!(address = %listener.local_addr()?, "Relay server listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown.recv().await;
    })
    .await?;

    info!("Relay server stopped");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

/// GET /health: server status
async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": current_time_ms(),
        "subscribers": state.relay.subscriber_count(),
        "prices": state.cache.len().await,
        "dropped_logs": log_layer::dropped_logs(),
    }))
}

/// GET /api/prices: latest quote per (source, pair)
async fn prices_handler(State(state): State<AppState>) -> Json<Vec<PriceQuote>> {
    Json(state.cache.snapshot().await)
}

/// GET /api/prices/history?limit=N: most recent accepted quotes, oldest first
async fn price_history_handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<PriceQuote>> {
    let history = state.price_history.lock().await;
    Json(history.recent(query.limit.unwrap_or(history.capacity())))
}

/// GET /api/spreads?limit=N: most recent spread samples, oldest first
async fn spreads_handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<SpreadSample>> {
    let history = state.spread_history.lock().await;
    Json(history.recent(query.limit.unwrap_or(history.capacity())))
}

/// GET /api/monitoring: latency and last update per source
async fn monitoring_handler(State(state): State<AppState>) -> Json<Vec<MonitoringUpdate>> {
    Json(state.monitors.snapshot().await)
}
