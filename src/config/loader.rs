//! Configuration loader for YAML files

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{AppError, Result};

use super::types::AppConfig;

/// Load and validate configuration from a YAML file
///
/// # Returns
/// * `Ok(AppConfig)` - Successfully loaded and validated configuration
/// * `Err(AppError)` - File not found, parse error, or validation failure
///
/// # Example
/// ```ignore
/// use std::path::Path;
/// use spread_sentry::config::load_config;
///
/// let config = load_config(Path::new("config.yaml"))?;
/// ```
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(AppError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let config: AppConfig = serde_yaml::from_reader(reader).map_err(|e| {
        AppError::Config(format!("YAML parse error in '{}': {}", path.display(), e))
    })?;

    config.validate()?;

    Ok(config)
}

/// Load configuration from a YAML string
pub fn load_config_from_str(yaml_content: &str) -> Result<AppConfig> {
    let config: AppConfig = serde_yaml::from_str(yaml_content)
        .map_err(|e| AppError::Config(format!("YAML parse error: {}", e)))?;

    config.validate()?;

    Ok(config)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::core::types::PriceRef;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_CONFIG_YAML: &str = r#"
relay:
  port: 9090
feeds:
  - kind: kraken
    pairs: [XBT/USD, BNB/USD]
  - kind: rest
    source: Coinbase
    pair: BTC/USD
    url: https://api.coinbase.com/v2/prices/BTC-USD/spot
    price_pointer: /data/amount
  - kind: onchain
    pair: BTC/BNB
    pair_address: "0x61eb789d75a95caa3ff50ed7e47b96c132fec082"
    base_token: "0x7130d2a12b9bcbfae4f2634d864a1ee1ce3ead9c"
    primary_rpc: https://bsc-dataseed.binance.org/
    fallback_rpc: https://bsc-dataseed1.defibit.io/
    api_fallback:
      base_id: bitcoin
      quote_id: binancecoin
evaluator:
  interval_secs: 5
  pairs:
    - name: BTC/USD
      leg_a: { source: Kraken, pair: BTC/USD }
      leg_b: { source: Coinbase, pair: BTC/USD }
      threshold: 100
    - name: BTC/USD via BNB
      leg_a:
        base: { source: PancakeSwap, pair: BTC/BNB }
        quote: { source: Kraken, pair: BNB/USD }
      leg_b: { source: Kraken, pair: BTC/USD }
"#;

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(VALID_CONFIG_YAML).unwrap();
        assert_eq!(config.relay.port, 9090);
        assert!(config.relay.rebroadcast_inbound);
        assert_eq!(config.feeds.len(), 3);
        assert!(matches!(config.feeds[2], FeedConfig::Onchain(_)));
        assert_eq!(config.evaluator.interval_secs, 5);
        assert_eq!(config.evaluator.pairs[0].threshold, 100.0);
        // threshold defaults when omitted
        assert_eq!(config.evaluator.pairs[1].threshold, 100.0);
        assert!(matches!(config.evaluator.pairs[1].leg_a, PriceRef::Cross { .. }));
        assert!(matches!(config.evaluator.pairs[0].leg_a, PriceRef::Direct(_)));
    }

    #[test]
    fn test_load_config_from_str_invalid_yaml() {
        let result = load_config_from_str("invalid: yaml: content: [");
        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("YAML parse error")));
    }

    #[test]
    fn test_unknown_feed_kind_rejected() {
        let yaml = "feeds:\n  - kind: bitfinex\n    source: X\n";
        assert!(load_config_from_str(yaml).is_err());
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let yaml = r#"
feeds:
  - kind: kraken
    pairs: [XBT/USD]
evaluator:
  pairs:
    - name: BTC/USD
      leg_a: { source: Kraken, pair: BTC/USD }
      leg_b: { source: Coinbase, pair: BTC/USD }
"#;
        let err = load_config_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("Coinbase"), "got {}", err);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(VALID_CONFIG_YAML.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.feeds[0].source(), "Kraken");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
