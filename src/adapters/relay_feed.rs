//! Upstream relay adapter.
//!
//! Subscribes to another relay instance and ingests its `price` envelopes,
//! so one process can collect quotes while another evaluates spreads.
//! Older producers send `{"exchange": "kraken", "price": 95000}` without a
//! pair; `aliases` and `default_pair` fill in what is missing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::{parse_price_value, ReconnectConfig};
use crate::adapters::traits::StreamingFeed;
use crate::core::types::{EventKind, PriceQuote, RelayEnvelope, SourceRef};

fn default_pair() -> String {
    "BTC/USD".to_string()
}

/// Configuration for an upstream relay subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayFeedConfig {
    /// Name of this feed in logs
    pub source: String,
    /// Upstream relay URL (e.g. `ws://127.0.0.1:8081`)
    pub url: String,
    /// Pair assumed when a payload carries none
    #[serde(default = "default_pair")]
    pub default_pair: String,
    /// Upstream `exchange` value → local `(source, pair)`
    #[serde(default)]
    pub aliases: HashMap<String, SourceRef>,
    /// Sources this feed is expected to deliver; used to validate spread legs
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Loose `price` payload accepted from upstream producers.
#[derive(Debug, Clone, Deserialize)]
struct UpstreamPrice {
    exchange: String,
    #[serde(default)]
    pair: Option<String>,
    price: serde_json::Value,
    #[serde(default, rename = "observedAt")]
    observed_at: Option<DateTime<Utc>>,
}

/// Streams quotes out of another relay.
pub struct RelayFeed {
    config: RelayFeedConfig,
}

impl RelayFeed {
    pub fn new(config: RelayFeedConfig) -> Self {
        Self { config }
    }

    fn resolve_key(&self, exchange: &str, pair: Option<&str>) -> SourceRef {
        if let Some(alias) = self.config.aliases.get(exchange) {
            return alias.clone();
        }
        SourceRef::new(exchange, pair.unwrap_or(&self.config.default_pair))
    }
}

impl StreamingFeed for RelayFeed {
    fn name(&self) -> &str {
        &self.config.source
    }

    fn endpoint(&self) -> &str {
        &self.config.url
    }

    fn subscribe_messages(&self) -> Vec<String> {
        vec![]
    }

    fn parse_message(&self, text: &str) -> ExchangeResult<Vec<PriceQuote>> {
        let envelope: RelayEnvelope = serde_json::from_str(text)
            .map_err(|e| ExchangeError::InvalidResponse(format!("relay envelope: {}", e)))?;

        if envelope.kind != EventKind::Price {
            return Ok(vec![]);
        }

        let payload: UpstreamPrice = serde_json::from_value(envelope.message)
            .map_err(|e| ExchangeError::InvalidResponse(format!("relay price payload: {}", e)))?;

        let price = parse_price_value(&payload.price).ok_or_else(|| {
            ExchangeError::InvalidResponse(format!("relay price is not a number: {}", payload.price))
        })?;

        let key = self.resolve_key(&payload.exchange, payload.pair.as_deref());
        let observed_at = payload.observed_at.unwrap_or_else(Utc::now);
        Ok(vec![PriceQuote::observed(key.source, key.pair, price, observed_at)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed() -> RelayFeed {
        RelayFeed::new(RelayFeedConfig {
            source: "PriceSentry".into(),
            url: "ws://127.0.0.1:8081".into(),
            default_pair: "BTC/USD".into(),
            aliases: HashMap::from([
                ("kraken".to_string(), SourceRef::new("Kraken", "BTC/USD")),
                ("kraken_bnb".to_string(), SourceRef::new("Kraken", "BNB/USD")),
                ("pancakeswap".to_string(), SourceRef::new("PancakeSwap", "BTC/BNB")),
            ]),
            provides: vec!["Kraken".into(), "PancakeSwap".into()],
            reconnect: ReconnectConfig::default(),
        })
    }

    #[test]
    fn test_full_quote_passes_through() {
        let raw = r#"{"type":"price","message":{"exchange":"Coinbase","pair":"ETH/USD","price":3200.5,"observedAt":"2025-01-01T00:00:00.000Z"},"timestamp":"2025-01-01T00:00:00.010Z"}"#;
        let quotes = feed().parse_message(raw).unwrap();
        assert_eq!(&*quotes[0].source, "Coinbase");
        assert_eq!(&*quotes[0].pair, "ETH/USD");
        assert_eq!(quotes[0].price, 3200.5);
        assert_eq!(quotes[0].observed_at.timestamp(), 1_735_689_600);
    }

    #[test]
    fn test_legacy_payload_uses_alias() {
        let raw = r#"{"type":"price","message":{"exchange":"kraken_bnb","price":612.4},"timestamp":"2025-01-01T00:00:00.000Z"}"#;
        let quotes = feed().parse_message(raw).unwrap();
        assert_eq!(&*quotes[0].source, "Kraken");
        assert_eq!(&*quotes[0].pair, "BNB/USD");
    }

    #[test]
    fn test_unknown_exchange_gets_default_pair() {
        let raw = r#"{"type":"price","message":{"exchange":"Binance","price":"95001"},"timestamp":"2025-01-01T00:00:00.000Z"}"#;
        let quotes = feed().parse_message(raw).unwrap();
        assert_eq!(&*quotes[0].source, "Binance");
        assert_eq!(&*quotes[0].pair, "BTC/USD");
        assert_eq!(quotes[0].price, 95001.0);
    }

    #[test]
    fn test_other_event_types_ignored() {
        let raw = r#"{"type":"log","message":"hello","timestamp":"2025-01-01T00:00:00.000Z"}"#;
        assert!(feed().parse_message(raw).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        let f = feed();
        assert!(f.parse_message("garbage").is_err());
        assert!(f
            .parse_message(r#"{"type":"price","message":{"price":1},"timestamp":"t"}"#)
            .is_err());
        assert!(f
            .parse_message(r#"{"type":"price","message":{"exchange":"x","price":"n/a"},"timestamp":"t"}"#)
            .is_err());
    }
}
