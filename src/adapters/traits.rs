//! Price feed trait definitions
//!
//! Two adapter shapes cover every source:
//! - [`StreamingFeed`]: a WebSocket endpoint that pushes ticker frames
//! - [`PollingFeed`]: a source read on a fixed interval (REST, on-chain)
//!
//! Adapters only know how to talk to their source and turn its payloads
//! into [`PriceQuote`]s. Connection supervision, reconnects and timeouts
//! live in the drivers in [`crate::adapters::manager`].

use std::time::Duration;

use async_trait::async_trait;

use crate::adapters::errors::ExchangeResult;
use crate::config::constants::feed_request_timeout;
use crate::core::types::PriceQuote;

/// A source that pushes quotes over a WebSocket.
///
/// # Example Implementation
///
/// ```ignore
/// struct EchoFeed;
///
/// impl StreamingFeed for EchoFeed {
///     fn name(&self) -> &str { "Echo" }
///     fn endpoint(&self) -> &str { "ws://127.0.0.1:9000" }
///     fn subscribe_messages(&self) -> Vec<String> { vec![] }
///     fn parse_message(&self, text: &str) -> ExchangeResult<Vec<PriceQuote>> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait StreamingFeed: Send + Sync {
    /// Source identifier used in quotes and logs
    fn name(&self) -> &str;

    /// WebSocket URL (`ws://` or `wss://`)
    fn endpoint(&self) -> &str;

    /// Text frames sent once after every (re)connect
    fn subscribe_messages(&self) -> Vec<String>;

    /// Turn one text frame into zero or more quotes.
    ///
    /// Control frames (heartbeats, status events) yield `Ok(vec![])`.
    /// Malformed frames yield `Err` and are discarded by the driver.
    fn parse_message(&self, text: &str) -> ExchangeResult<Vec<PriceQuote>>;
}

/// A source read on a fixed interval.
#[async_trait]
pub trait PollingFeed: Send + Sync {
    /// Source identifier used in quotes and logs
    fn name(&self) -> &str;

    /// Time between two polls
    fn interval(&self) -> Duration;

    /// Upper bound on a single `poll()`, including any internal retries
    fn poll_timeout(&self) -> Duration {
        feed_request_timeout()
    }

    /// Read the current price(s)
    async fn poll(&self) -> ExchangeResult<Vec<PriceQuote>>;
}
