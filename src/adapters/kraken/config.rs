//! Kraken Configuration
//!
//! Public ticker feed; no credentials required.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::adapters::shared::ReconnectConfig;

// =============================================================================
// Constants
// =============================================================================

/// Public WebSocket URL (v1 API)
pub const KRAKEN_WS_URL: &str = "wss://ws.kraken.com";

fn default_source() -> String {
    "Kraken".to_string()
}

fn default_url() -> String {
    KRAKEN_WS_URL.to_string()
}

fn default_aliases() -> HashMap<String, String> {
    HashMap::from([("XBT/USD".to_string(), "BTC/USD".to_string())])
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Kraken ticker stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KrakenFeedConfig {
    /// Source name used in quotes (default "Kraken")
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_url")]
    pub url: String,
    /// Exchange pair names to subscribe to (e.g. "XBT/USD")
    pub pairs: Vec<String>,
    /// Exchange pair name → canonical pair name
    #[serde(default = "default_aliases")]
    pub aliases: HashMap<String, String>,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl KrakenFeedConfig {
    pub fn new(pairs: Vec<String>) -> Self {
        Self {
            source: default_source(),
            url: default_url(),
            pairs,
            aliases: default_aliases(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Canonical name for an exchange pair.
    pub fn canonical_pair<'a>(&'a self, exchange_pair: &'a str) -> &'a str {
        self.aliases
            .get(exchange_pair)
            .map(String::as_str)
            .unwrap_or(exchange_pair)
    }
}
