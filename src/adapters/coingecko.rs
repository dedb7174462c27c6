//! CoinGecko `simple/price` client, used as the last-resort price source
//! when on-chain reads fail on every endpoint.
//!
//! Prices are requested in USD and divided to get `base/quote`, e.g.
//! `bitcoin.usd / binancecoin.usd` for BTC/BNB.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::{create_http_client, get_json, parse_price_value, retry_rate_limited};
use crate::config::constants::feed_request_timeout;

/// Public API root
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

const SOURCE_NAME: &str = "CoinGecko";

fn default_api_url() -> String {
    COINGECKO_API_URL.to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

fn default_timeout_secs() -> u64 {
    feed_request_timeout().as_secs()
}

/// CoinGecko fallback configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinGeckoConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// CoinGecko id of the base asset (e.g. "bitcoin")
    pub base_id: String,
    /// CoinGecko id of the quote asset (e.g. "binancecoin"), or "usd"
    pub quote_id: String,
    /// Total attempts while rate limited
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff base; doubles after each 429
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl CoinGeckoConfig {
    pub fn new(base_id: impl Into<String>, quote_id: impl Into<String>) -> Self {
        Self {
            api_url: default_api_url(),
            base_id: base_id.into(),
            quote_id: quote_id.into(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }

    fn quoted_in_usd(&self) -> bool {
        self.quote_id.eq_ignore_ascii_case("usd")
    }

    /// Full `simple/price` URL for this pair.
    pub fn request_url(&self) -> String {
        let ids = if self.quoted_in_usd() {
            self.base_id.clone()
        } else {
            format!("{},{}", self.base_id, self.quote_id)
        };
        format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.api_url.trim_end_matches('/'),
            ids
        )
    }

    /// Worst-case time spent in one `fetch_price` call.
    pub fn budget(&self) -> Duration {
        let attempts = self.max_retries.max(1);
        let request = Duration::from_secs(self.timeout_secs.max(1)) * attempts;
        let backoff: u64 = (0..attempts.saturating_sub(1))
            .map(|n| self.retry_delay_ms << n.min(16))
            .sum();
        request + Duration::from_millis(backoff)
    }
}

/// Thin CoinGecko client with 429 backoff.
pub struct CoinGeckoPriceApi {
    config: CoinGeckoConfig,
    client: reqwest::Client,
    timeout: Duration,
}

impl CoinGeckoPriceApi {
    pub fn new(config: CoinGeckoConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        Self {
            client: create_http_client(SOURCE_NAME, timeout),
            config,
            timeout,
        }
    }

    pub fn config(&self) -> &CoinGeckoConfig {
        &self.config
    }

    /// `base/quote` price, retried with exponential backoff while rate limited.
    pub async fn fetch_price(&self) -> ExchangeResult<f64> {
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        retry_rate_limited(self.config.max_retries, delay, SOURCE_NAME, || self.fetch_once()).await
    }

    async fn fetch_once(&self) -> ExchangeResult<f64> {
        let url = self.config.request_url();
        let body = get_json(&self.client, SOURCE_NAME, &url, self.timeout).await?;
        self.price_from_body(&body)
    }

    pub fn price_from_body(&self, body: &serde_json::Value) -> ExchangeResult<f64> {
        let base = usd_price(body, &self.config.base_id)?;
        if self.config.quoted_in_usd() {
            return Ok(base);
        }
        let quote = usd_price(body, &self.config.quote_id)?;
        if quote <= 0.0 {
            return Err(ExchangeError::InvalidResponse(format!(
                "{}: {} priced at {}",
                SOURCE_NAME, self.config.quote_id, quote
            )));
        }
        Ok(base / quote)
    }
}

fn usd_price(body: &serde_json::Value, id: &str) -> ExchangeResult<f64> {
    body.get(id)
        .and_then(|asset| asset.get("usd"))
        .and_then(parse_price_value)
        .ok_or_else(|| {
            ExchangeError::InvalidResponse(format!("{}: no usd price for {}", SOURCE_NAME, id))
        })
}
