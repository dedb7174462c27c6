//! On-chain reserve feed configuration
//!
//! Defaults target the PancakeSwap WBNB/BTCB pair on BNB Chain.

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::adapters::coingecko::CoinGeckoConfig;
use crate::config::constants::feed_request_timeout;
use crate::error::{AppError, Result};

// =============================================================================
// Constants
// =============================================================================

/// BNB Chain public RPC (primary)
pub const BSC_PRIMARY_RPC: &str = "https://bsc-dataseed.binance.org/";
/// BNB Chain public RPC (fallback)
pub const BSC_FALLBACK_RPC: &str = "https://bsc-dataseed1.defibit.io/";
/// PancakeSwap V2 WBNB/BTCB pair
pub const PANCAKE_WBNB_BTCB_PAIR: &str = "0x61eb789d75a95caa3ff50ed7e47b96c132fec082";
/// Wrapped BNB
pub const WBNB: &str = "0xbb4cdb9cbd36b01bd1cbaebf2de08d9173bc095c";
/// Binance-peg BTC
pub const BTCB: &str = "0x7130d2a12b9bcbfae4f2634d864a1ee1ce3ead9c";

fn default_source() -> String {
    "PancakeSwap".to_string()
}

fn default_decimals() -> u8 {
    18
}

fn default_interval_secs() -> u64 {
    10
}

fn default_max_contract_retries() -> u32 {
    3
}

fn default_max_total_retries() -> u32 {
    6
}

fn default_retry_delay_ms() -> u64 {
    2_000
}

fn default_timeout_secs() -> u64 {
    feed_request_timeout().as_secs()
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a Uniswap-V2-style pair read through JSON-RPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnChainFeedConfig {
    #[serde(default = "default_source")]
    pub source: String,
    /// Canonical pair name, `BASE/QUOTE` (e.g. "BTC/BNB")
    pub pair: String,
    pub pair_address: String,
    /// Token whose price is quoted; the other pair token is the quote
    pub base_token: String,
    #[serde(default = "default_decimals")]
    pub base_decimals: u8,
    #[serde(default = "default_decimals")]
    pub quote_decimals: u8,
    pub primary_rpc: String,
    #[serde(default)]
    pub fallback_rpc: Option<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Failures on the primary endpoint before switching to the fallback
    #[serde(default = "default_max_contract_retries")]
    pub max_contract_retries: u32,
    /// Contract attempts across both endpoints before the API fallback
    #[serde(default = "default_max_total_retries")]
    pub max_total_retries: u32,
    /// Pause between two contract attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Per contract call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_fallback: Option<CoinGeckoConfig>,
}

impl OnChainFeedConfig {
    /// PancakeSwap BTCB priced in WBNB, with CoinGecko as last resort.
    pub fn pancakeswap_btc_bnb() -> Self {
        Self {
            source: default_source(),
            pair: "BTC/BNB".to_string(),
            pair_address: PANCAKE_WBNB_BTCB_PAIR.to_string(),
            base_token: BTCB.to_string(),
            base_decimals: default_decimals(),
            quote_decimals: default_decimals(),
            primary_rpc: BSC_PRIMARY_RPC.to_string(),
            fallback_rpc: Some(BSC_FALLBACK_RPC.to_string()),
            interval_secs: default_interval_secs(),
            max_contract_retries: default_max_contract_retries(),
            max_total_retries: default_max_total_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            api_fallback: Some(CoinGeckoConfig::new("bitcoin", "binancecoin")),
        }
    }

    pub fn pair_address(&self) -> Result<Address> {
        parse_address(&self.source, "pair_address", &self.pair_address)
    }

    pub fn base_token(&self) -> Result<Address> {
        parse_address(&self.source, "base_token", &self.base_token)
    }

    /// Validate feed-level rules
    pub fn validate(&self) -> Result<()> {
        self.pair_address()?;
        self.base_token()?;

        if self.max_contract_retries == 0 {
            return Err(AppError::Config(format!(
                "Feed '{}': max_contract_retries must be > 0",
                self.source
            )));
        }

        if self.max_total_retries < self.max_contract_retries {
            return Err(AppError::Config(format!(
                "Feed '{}': max_total_retries ({}) must be >= max_contract_retries ({})",
                self.source, self.max_total_retries, self.max_contract_retries
            )));
        }

        if self.base_decimals > 36 || self.quote_decimals > 36 {
            return Err(AppError::Config(format!(
                "Feed '{}': token decimals must be <= 36",
                self.source
            )));
        }

        Ok(())
    }
}

fn parse_address(source: &str, field: &str, raw: &str) -> Result<Address> {
    raw.parse::<Address>().map_err(|e| {
        AppError::Config(format!(
            "Feed '{}': invalid {} '{}': {}",
            source, field, raw, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pancakeswap_preset_is_valid() {
        let config = OnChainFeedConfig::pancakeswap_btc_bnb();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_contract_retries, 3);
        assert_eq!(config.max_total_retries, 6);
        assert_eq!(config.retry_delay_ms, 2_000);
    }

    #[test]
    fn test_bad_address_rejected() {
        let config = OnChainFeedConfig {
            base_token: "0x1234".into(),
            ..OnChainFeedConfig::pancakeswap_btc_bnb()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("base_token"), "got {}", err);
    }

    #[test]
    fn test_total_below_contract_retries_rejected() {
        let config = OnChainFeedConfig {
            max_contract_retries: 3,
            max_total_retries: 2,
            ..OnChainFeedConfig::pancakeswap_btc_bnb()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_defaults() {
        let yaml = r#"
pair: BTC/BNB
pair_address: "0x61eb789d75a95caa3ff50ed7e47b96c132fec082"
base_token: "0x7130d2a12b9bcbfae4f2634d864a1ee1ce3ead9c"
primary_rpc: https://bsc-dataseed.binance.org/
"#;
        let config: OnChainFeedConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.source, "PancakeSwap");
        assert_eq!(config.base_decimals, 18);
        assert!(config.fallback_rpc.is_none());
        assert!(config.api_fallback.is_none());
    }
}
