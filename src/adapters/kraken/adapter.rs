//! Kraken ticker stream adapter.

use tracing::debug;

use crate::adapters::errors::ExchangeResult;
use crate::adapters::traits::StreamingFeed;
use crate::core::types::PriceQuote;

use super::config::KrakenFeedConfig;
use super::types::{parse_frame, KrakenFrame, KrakenSubscribeRequest};

/// Streams last-trade prices from Kraken's public ticker channel.
pub struct KrakenTickerFeed {
    config: KrakenFeedConfig,
}

impl KrakenTickerFeed {
    pub fn new(config: KrakenFeedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KrakenFeedConfig {
        &self.config
    }
}

impl StreamingFeed for KrakenTickerFeed {
    fn name(&self) -> &str {
        &self.config.source
    }

    fn endpoint(&self) -> &str {
        &self.config.url
    }

    fn subscribe_messages(&self) -> Vec<String> {
        let request = KrakenSubscribeRequest::ticker(self.config.pairs.clone());
        // Serialising a struct of strings cannot fail
        vec![serde_json::to_string(&request).unwrap_or_default()]
    }

    fn parse_message(&self, text: &str) -> ExchangeResult<Vec<PriceQuote>> {
        match parse_frame(text)? {
            KrakenFrame::Ticker { pair, price } => {
                let canonical = self.config.canonical_pair(&pair);
                Ok(vec![PriceQuote::new(self.config.source.as_str(), canonical, price)])
            }
            KrakenFrame::Event(event) => {
                debug!(source = %self.config.source, event = %event, "Ignoring control frame");
                Ok(vec![])
            }
        }
    }
}
