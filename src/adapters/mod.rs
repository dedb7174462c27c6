//! Price feed adapters for Kraken, REST endpoints, on-chain AMM pairs and
//! upstream relays
//!
//! Each adapter turns one upstream source into [`PriceQuote`]s. The
//! [`manager`] drives them and pushes their output into the shared
//! [`FeedContext`](crate::core::FeedContext).
//!
//! [`PriceQuote`]: crate::core::PriceQuote

pub mod coingecko;
pub mod errors;
pub mod kraken;
pub mod manager;
pub mod onchain;
pub mod relay_feed;
pub mod rest;
pub mod shared;
pub mod traits;

// Re-export commonly used types for convenience
pub use coingecko::{CoinGeckoConfig, CoinGeckoPriceApi};
pub use errors::{ExchangeError, ExchangeResult};
pub use kraken::{KrakenFeedConfig, KrakenTickerFeed};
pub use manager::{build_feed, FeedHandle, FeedManager, FeedState};
pub use onchain::{OnChainFeedConfig, OnChainReserveFeed};
pub use relay_feed::{RelayFeed, RelayFeedConfig};
pub use rest::{RestFeedConfig, RestPriceFeed};
pub use shared::ReconnectConfig;
pub use traits::{PollingFeed, StreamingFeed};
