//! Generic REST spot-price adapter.
//!
//! GETs a JSON endpoint on a fixed interval and reads the price at a JSON
//! pointer:
//! - Coinbase spot: `https://api.coinbase.com/v2/prices/BTC-USD/spot`, pointer `/data/amount`
//! - Binance ticker: `https://api.binance.com/api/v3/ticker/price?symbol=BTCUSDT`, pointer `/price`

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::{create_http_client, get_json, parse_price_value};
use crate::adapters::traits::PollingFeed;
use crate::config::constants::feed_request_timeout;
use crate::core::types::PriceQuote;

fn default_interval_secs() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    feed_request_timeout().as_secs()
}

/// Configuration for a REST price source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestFeedConfig {
    /// Source name used in quotes (e.g. "Coinbase")
    pub source: String,
    /// Canonical pair name (e.g. "BTC/USD")
    pub pair: String,
    pub url: String,
    /// RFC 6901 pointer to the price field
    pub price_pointer: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RestFeedConfig {
    /// Coinbase public spot price for `BASE-QUOTE`.
    pub fn coinbase_spot(base: &str, quote: &str) -> Self {
        Self {
            source: "Coinbase".to_string(),
            pair: format!("{}/{}", base, quote),
            url: format!("https://api.coinbase.com/v2/prices/{}-{}/spot", base, quote),
            price_pointer: "/data/amount".to_string(),
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Polls a JSON endpoint for a single price.
pub struct RestPriceFeed {
    config: RestFeedConfig,
    client: reqwest::Client,
    timeout: Duration,
}

impl RestPriceFeed {
    pub fn new(config: RestFeedConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = create_http_client(&config.source, timeout);
        Self {
            config,
            client,
            timeout,
        }
    }

    /// Extract the price from a decoded response body.
    pub fn extract_price(&self, body: &serde_json::Value) -> ExchangeResult<f64> {
        let field = body.pointer(&self.config.price_pointer).ok_or_else(|| {
            ExchangeError::InvalidResponse(format!(
                "{}: no field at {}",
                self.config.source, self.config.price_pointer
            ))
        })?;

        parse_price_value(field).ok_or_else(|| {
            ExchangeError::InvalidResponse(format!(
                "{}: {} is not a number: {}",
                self.config.source, self.config.price_pointer, field
            ))
        })
    }
}

#[async_trait]
impl PollingFeed for RestPriceFeed {
    fn name(&self) -> &str {
        &self.config.source
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs.max(1))
    }

    fn poll_timeout(&self) -> Duration {
        self.timeout
    }

    async fn poll(&self) -> ExchangeResult<Vec<PriceQuote>> {
        let body = get_json(&self.client, &self.config.source, &self.config.url, self.timeout).await?;
        let price = self.extract_price(&body)?;
        Ok(vec![PriceQuote::new(
            self.config.source.as_str(),
            self.config.pair.as_str(),
            price,
        )])
    }
}
