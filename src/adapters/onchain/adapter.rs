//! AMM reserve price feed with RPC failover and an external API fallback.
//!
//! One poll cycle:
//! 1. read the pair on the primary endpoint, up to `max_contract_retries` times;
//! 2. switch to the fallback endpoint for the remaining attempts, up to
//!    `max_total_retries` in total;
//! 3. if every contract read failed, ask the external price API.
//!
//! Attempts are separated by `retry_delay_ms`. Every cycle starts on the
//! primary endpoint again.

use std::time::Duration;

use async_trait::async_trait;
use ethers::types::Address;
use tracing::{info, warn};

use crate::adapters::coingecko::CoinGeckoPriceApi;
use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::traits::PollingFeed;
use crate::core::types::PriceQuote;
use crate::error::AppError;

use super::config::OnChainFeedConfig;
use super::reader::{PairReader, PairSnapshot, RpcPairReader};

/// Which endpoint served (or failed) an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Primary,
    Fallback,
}

impl std::fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointRole::Primary => write!(f, "primary"),
            EndpointRole::Fallback => write!(f, "fallback"),
        }
    }
}

/// Polls a Uniswap-V2-style pair for `reserve_quote / reserve_base`.
pub struct OnChainReserveFeed {
    config: OnChainFeedConfig,
    base_token: Address,
    primary: Box<dyn PairReader>,
    fallback: Option<Box<dyn PairReader>>,
    api: Option<CoinGeckoPriceApi>,
}

impl OnChainReserveFeed {
    /// Build the feed with JSON-RPC readers for the configured endpoints.
    pub fn new(config: OnChainFeedConfig) -> Result<Self, AppError> {
        config.validate()?;
        let pair = config.pair_address()?;
        let timeout = Duration::from_secs(config.timeout_secs.max(1));

        let primary: Box<dyn PairReader> =
            Box::new(RpcPairReader::new(&config.primary_rpc, pair, timeout)?);
        let fallback = match &config.fallback_rpc {
            Some(url) => Some(Box::new(RpcPairReader::new(url, pair, timeout)?) as Box<dyn PairReader>),
            None => None,
        };
        let api = config.api_fallback.clone().map(CoinGeckoPriceApi::new);

        Self::with_readers(config, primary, fallback, api)
    }

    /// Build the feed over arbitrary readers.
    pub fn with_readers(
        config: OnChainFeedConfig,
        primary: Box<dyn PairReader>,
        fallback: Option<Box<dyn PairReader>>,
        api: Option<CoinGeckoPriceApi>,
    ) -> Result<Self, AppError> {
        let base_token = config.base_token()?;
        Ok(Self {
            config,
            base_token,
            primary,
            fallback,
            api,
        })
    }

    /// Price of the base token in quote-token units, decimals applied.
    ///
    /// A zero reserve on either side is an invalid response.
    pub fn price_from_snapshot(&self, snapshot: &PairSnapshot) -> ExchangeResult<f64> {
        let (base_raw, quote_raw) = snapshot.oriented(self.base_token)?;
        if base_raw == 0 || quote_raw == 0 {
            return Err(ExchangeError::InvalidResponse(format!(
                "{}: empty reserves (base={}, quote={})",
                self.config.source, base_raw, quote_raw
            )));
        }

        let base = scale(base_raw, self.config.base_decimals);
        let quote = scale(quote_raw, self.config.quote_decimals);
        Ok(quote / base)
    }

    fn reader(&self, role: EndpointRole) -> &dyn PairReader {
        match (role, &self.fallback) {
            (EndpointRole::Fallback, Some(fallback)) => fallback.as_ref(),
            _ => self.primary.as_ref(),
        }
    }

    /// Contract attempts with endpoint failover. Returns the price and the
    /// endpoint that produced it.
    pub async fn read_with_failover(&self) -> ExchangeResult<(f64, EndpointRole)> {
        let source = &self.config.source;
        let max_contract = self.config.max_contract_retries.max(1);
        let max_total = self.config.max_total_retries.max(max_contract);
        let delay = Duration::from_millis(self.config.retry_delay_ms);

        let mut role = EndpointRole::Primary;
        let mut last_error = None;

        for attempt in 1..=max_total {
            if attempt > max_contract && role == EndpointRole::Primary && self.fallback.is_some() {
                warn!(source = %source, "Switching to fallback RPC endpoint");
                role = EndpointRole::Fallback;
            }

            let reader = self.reader(role);
            let result = match reader.read_pair().await {
                Ok(snapshot) => self.price_from_snapshot(&snapshot),
                Err(e) => Err(e),
            };

            match result {
                Ok(price) => {
                    if role == EndpointRole::Fallback {
                        info!(source = %source, "Read succeeded on fallback endpoint; next cycle starts on primary");
                    }
                    return Ok((price, role));
                }
                Err(e) => {
                    warn!(
                        source = %source,
                        endpoint = %reader.endpoint(),
                        role = %role,
                        attempt,
                        max_total,
                        error = %e,
                        "Contract read failed"
                    );
                    last_error = Some(e);
                }
            }

            if attempt < max_total && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ExchangeError::ConnectionFailed(format!("{}: no contract attempt made", source))
        }))
    }

    fn quote(&self, price: f64) -> PriceQuote {
        PriceQuote::new(self.config.source.as_str(), self.config.pair.as_str(), price)
    }
}

fn scale(raw: u128, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

#[async_trait]
impl PollingFeed for OnChainReserveFeed {
    fn name(&self) -> &str {
        &self.config.source
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs.max(1))
    }

    fn poll_timeout(&self) -> Duration {
        let attempts = self.config.max_total_retries.max(1);
        let per_attempt = Duration::from_secs(self.config.timeout_secs.max(1)) * 3
            + Duration::from_millis(self.config.retry_delay_ms);
        let api = self.api.as_ref().map(|a| a.config().budget()).unwrap_or_default();
        per_attempt * attempts + api
    }

    async fn poll(&self) -> ExchangeResult<Vec<PriceQuote>> {
        let contract_error = match self.read_with_failover().await {
            Ok((price, _role)) => return Ok(vec![self.quote(price)]),
            Err(e) => e,
        };

        let api = match &self.api {
            Some(api) => api,
            None => return Err(contract_error),
        };

        warn!(
            source = %self.config.source,
            attempts = self.config.max_total_retries,
            error = %contract_error,
            "Contract reads exhausted, falling back to price API"
        );
        let price = api.fetch_price().await?;
        info!(source = %self.config.source, price, "Price obtained from API fallback");
        Ok(vec![self.quote(price)])
    }
}
