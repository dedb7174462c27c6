//! Kraken exchange adapter module
//!
//! Provides WebSocket-based real-time last-trade prices from Kraken's
//! public ticker channel.

pub mod adapter;
pub mod config;
pub mod types;

pub use adapter::KrakenTickerFeed;
pub use config::KrakenFeedConfig;
