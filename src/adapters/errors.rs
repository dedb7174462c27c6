//! Price feed error types
//!
//! All feed-related errors are wrapped in ExchangeError enum
//! which implements thiserror for consistent error handling.
//! None of them is fatal: the feed drivers log and retry.

use thiserror::Error;

/// Feed-specific error types for adapter operations
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Connection to the price source failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Subscription to market data failed
    #[error("Subscription failed for {pair}: {reason}")]
    SubscriptionFailed { pair: String, reason: String },

    /// Network operation timed out
    #[error("Network timeout after {0}ms")]
    NetworkTimeout(u64),

    /// Invalid or unexpected response from the source
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Source answered with HTTP 429
    #[error("Rate limited by {0}")]
    RateLimited(String),

    /// Read-only contract call failed
    #[error("Contract call failed on {endpoint}: {reason}")]
    ContractCall { endpoint: String, reason: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket protocol error (boxed to reduce enum size)
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
}

impl ExchangeError {
    /// Whether the error is an HTTP 429 that deserves a backoff
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ExchangeError::RateLimited(_))
    }
}

/// Result type alias for feed operations
pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;
