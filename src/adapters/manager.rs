//! Feed manager: builds adapters from config and supervises them.
//!
//! Spawns one Tokio task per feed. Streaming feeds run an explicit
//! `Connecting → Open → Closed { reconnect_in }` state machine; polling
//! feeds read once per tick. Errors never escape a task: they are logged
//! and retried on the next scheduled attempt.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::adapters::kraken::KrakenTickerFeed;
use crate::adapters::onchain::OnChainReserveFeed;
use crate::adapters::relay_feed::RelayFeed;
use crate::adapters::rest::RestPriceFeed;
use crate::adapters::shared::{connect_tls, ReconnectConfig, TlsWebSocketStream};
use crate::adapters::traits::{PollingFeed, StreamingFeed};
use crate::config::FeedConfig;
use crate::core::monitoring::FeedContext;
use crate::error::AppError;

/// Connection state of a streaming feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Connecting,
    Open,
    Closed { reconnect_in: Duration },
}

/// Why a streaming session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Shutdown,
    Disconnected(String),
}

/// A built adapter, ready to be driven.
pub enum FeedHandle {
    Streaming {
        feed: Arc<dyn StreamingFeed>,
        reconnect: ReconnectConfig,
    },
    Polling(Arc<dyn PollingFeed>),
}

impl FeedHandle {
    pub fn name(&self) -> &str {
        match self {
            FeedHandle::Streaming { feed, .. } => feed.name(),
            FeedHandle::Polling(feed) => feed.name(),
        }
    }
}

/// Instantiate the adapter described by `config`.
pub fn build_feed(config: &FeedConfig) -> Result<FeedHandle, AppError> {
    let handle = match config {
        FeedConfig::Kraken(c) => FeedHandle::Streaming {
            reconnect: c.reconnect.clone(),
            feed: Arc::new(KrakenTickerFeed::new(c.clone())),
        },
        FeedConfig::Relay(c) => FeedHandle::Streaming {
            reconnect: c.reconnect.clone(),
            feed: Arc::new(RelayFeed::new(c.clone())),
        },
        FeedConfig::Rest(c) => FeedHandle::Polling(Arc::new(RestPriceFeed::new(c.clone()))),
        FeedConfig::Onchain(c) => FeedHandle::Polling(Arc::new(OnChainReserveFeed::new(c.clone())?)),
    };
    Ok(handle)
}

/// Owns the configured feeds until they are spawned.
pub struct FeedManager {
    feeds: Vec<FeedHandle>,
    ctx: FeedContext,
    connect_timeout: Duration,
}

impl FeedManager {
    pub fn new(feeds: Vec<FeedHandle>, ctx: FeedContext, connect_timeout: Duration) -> Self {
        Self {
            feeds,
            ctx,
            connect_timeout,
        }
    }

    /// Build every configured feed. Fails on the first invalid one.
    pub fn from_config(
        configs: &[FeedConfig],
        ctx: FeedContext,
        connect_timeout: Duration,
    ) -> Result<Self, AppError> {
        let feeds = configs.iter().map(build_feed).collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(feeds, ctx, connect_timeout))
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    /// Spawn one task per feed.
    ///
    /// Returns a map of feed name → JoinHandle for monitoring.
    pub fn spawn_all(self, shutdown: &broadcast::Sender<()>) -> HashMap<String, JoinHandle<()>> {
        let mut handles = HashMap::new();
        let names: Vec<String> = self.feeds.iter().map(|f| f.name().to_string()).collect();

        for feed in self.feeds {
            let name = feed.name().to_string();
            let ctx = self.ctx.clone();
            let rx = shutdown.subscribe();
            let connect_timeout = self.connect_timeout;

            let handle = match feed {
                FeedHandle::Streaming { feed, reconnect } => tokio::spawn(async move {
                    run_streaming_feed(feed, ctx, reconnect, connect_timeout, rx).await;
                }),
                FeedHandle::Polling(feed) => tokio::spawn(async move {
                    run_polling_feed(feed, ctx, rx).await;
                }),
            };
            handles.insert(name, handle);
        }

        info!(feeds = ?names, "All price feeds launched");
        handles
    }
}

// =============================================================================
// Streaming driver
// =============================================================================

/// Drive a streaming feed until shutdown.
pub async fn run_streaming_feed(
    feed: Arc<dyn StreamingFeed>,
    ctx: FeedContext,
    reconnect: ReconnectConfig,
    connect_timeout: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let name = feed.name().to_string();
    let mut state = FeedState::Connecting;
    let mut failures: u32 = 0;
    let mut stream: Option<TlsWebSocketStream> = None;

    loop {
        state = match state {
            FeedState::Connecting => {
                info!(source = %name, endpoint = %feed.endpoint(), "Connecting");
                tokio::select! {
                    result = connect_tls(feed.endpoint(), connect_timeout) => match result {
                        Ok(ws) => {
                            failures = 0;
                            stream = Some(ws);
                            FeedState::Open
                        }
                        Err(e) => {
                            failures = failures.saturating_add(1);
                            let reconnect_in = reconnect.delay_for(failures);
                            warn!(
                                source = %name,
                                error = %e,
                                retry_in_ms = reconnect_in.as_millis() as u64,
                                "Connect failed"
                            );
                            FeedState::Closed { reconnect_in }
                        }
                    },
                    _ = shutdown.recv() => break,
                }
            }
            FeedState::Open => {
                let ws = match stream.take() {
                    Some(ws) => ws,
                    None => {
                        state = FeedState::Connecting;
                        continue;
                    }
                };
                match run_session(feed.as_ref(), &ctx, ws, &mut shutdown).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Disconnected(reason) => {
                        failures = 1;
                        let reconnect_in = reconnect.delay_for(failures);
                        warn!(
                            source = %name,
                            reason = %reason,
                            retry_in_ms = reconnect_in.as_millis() as u64,
                            "Stream closed, reconnecting"
                        );
                        FeedState::Closed { reconnect_in }
                    }
                }
            }
            FeedState::Closed { reconnect_in } => {
                tokio::select! {
                    _ = tokio::time::sleep(reconnect_in) => FeedState::Connecting,
                    _ = shutdown.recv() => break,
                }
            }
        };
    }

    info!(source = %name, "Feed stopped");
}

/// One connected session: subscribe, then pump frames into the context.
pub async fn run_session(
    feed: &dyn StreamingFeed,
    ctx: &FeedContext,
    ws: TlsWebSocketStream,
    shutdown: &mut broadcast::Receiver<()>,
) -> SessionEnd {
    let (mut write, mut read) = ws.split();

    for msg in feed.subscribe_messages() {
        if let Err(e) = write.send(Message::Text(msg)).await {
            return SessionEnd::Disconnected(format!("subscribe failed: {}", e));
        }
    }
    info!(source = %feed.name(), "Stream open");

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let received = Instant::now();
                    match feed.parse_message(&text) {
                        Ok(quotes) => {
                            for quote in quotes {
                                ctx.publish_quote(quote, received.elapsed()).await;
                            }
                        }
                        Err(e) => {
                            warn!(source = %feed.name(), error = %e, "Discarding malformed frame");
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if write.send(Message::Pong(data)).await.is_err() {
                        return SessionEnd::Disconnected("pong failed".to_string());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    return SessionEnd::Disconnected(format!("closed by peer: {:?}", frame));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
                None => return SessionEnd::Disconnected("stream ended".to_string()),
            },
            _ = shutdown.recv() => {
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
        }
    }
}

// =============================================================================
// Polling driver
// =============================================================================

/// Drive a polling feed until shutdown.
pub async fn run_polling_feed(
    feed: Arc<dyn PollingFeed>,
    ctx: FeedContext,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(feed.interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        source = %feed.name(),
        interval_secs = feed.interval().as_secs(),
        "Polling feed started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tokio::select! {
                    _ = poll_once(feed.as_ref(), &ctx) => {}
                    _ = shutdown.recv() => break,
                }
            }
            _ = shutdown.recv() => break,
        }
    }

    info!(source = %feed.name(), "Feed stopped");
}

/// Run one bounded poll and publish its quotes. Returns how many were accepted.
pub async fn poll_once(feed: &dyn PollingFeed, ctx: &FeedContext) -> usize {
    let started = Instant::now();
    let budget = feed.poll_timeout();

    match tokio::time::timeout(budget, feed.poll()).await {
        Ok(Ok(quotes)) => {
            let latency = started.elapsed();
            let mut accepted = 0;
            for quote in quotes {
                if ctx.publish_quote(quote, latency).await {
                    accepted += 1;
                }
            }
            debug!(source = %feed.name(), accepted, latency_ms = latency.as_millis() as u64, "Poll complete");
            accepted
        }
        Ok(Err(e)) => {
            warn!(source = %feed.name(), error = %e, "Poll failed, retrying next tick");
            0
        }
        Err(_) => {
            warn!(
                source = %feed.name(),
                timeout_ms = budget.as_millis() as u64,
                "Poll timed out, retrying next tick"
            );
            0
        }
    }
}
