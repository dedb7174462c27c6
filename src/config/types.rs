//! Configuration types loaded from YAML
//!
//! `AppConfig` is read once at startup and handed to the tasks that need it.
//! Every section has defaults so a minimal file only lists feeds and pairs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::adapters::kraken::KrakenFeedConfig;
use crate::adapters::onchain::OnChainFeedConfig;
use crate::adapters::relay_feed::RelayFeedConfig;
use crate::adapters::rest::RestFeedConfig;
use crate::config::constants::{
    price_history_capacity, relay_port, spread_history_capacity, subscriber_queue_capacity,
};
use crate::core::evaluator::{SpreadPairConfig, DEFAULT_EVAL_INTERVAL};
use crate::error::{AppError, Result};

// ============================================================================
// Defaults
// ============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    10
}

fn default_eval_interval_secs() -> u64 {
    DEFAULT_EVAL_INTERVAL.as_secs()
}

// ============================================================================
// Sections
// ============================================================================

/// Relay (WebSocket server) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "relay_port")]
    pub port: u16,
    /// Pending messages per subscriber before new ones are skipped
    #[serde(default = "subscriber_queue_capacity")]
    pub queue_capacity: usize,
    /// Re-publish valid envelopes received from subscribers
    #[serde(default = "default_true")]
    pub rebroadcast_inbound: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: relay_port(),
            queue_capacity: subscriber_queue_capacity(),
            rebroadcast_inbound: true,
        }
    }
}

/// One price feed, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeedConfig {
    Kraken(KrakenFeedConfig),
    Rest(RestFeedConfig),
    Onchain(OnChainFeedConfig),
    Relay(RelayFeedConfig),
}

impl FeedConfig {
    /// Feed name, unique across the file
    pub fn source(&self) -> &str {
        match self {
            FeedConfig::Kraken(c) => &c.source,
            FeedConfig::Rest(c) => &c.source,
            FeedConfig::Onchain(c) => &c.source,
            FeedConfig::Relay(c) => &c.source,
        }
    }

    /// Source names this feed writes into the cache
    pub fn provided_sources(&self) -> Vec<&str> {
        match self {
            FeedConfig::Relay(c) => {
                let mut sources: Vec<&str> = c.provides.iter().map(String::as_str).collect();
                sources.extend(c.aliases.values().map(|r| r.source.as_str()));
                sources
            }
            other => vec![other.source()],
        }
    }

    /// Per-kind rules
    pub fn validate(&self) -> Result<()> {
        if self.source().trim().is_empty() {
            return Err(AppError::Config("Feed source cannot be empty".to_string()));
        }

        match self {
            FeedConfig::Kraken(c) => {
                if c.pairs.is_empty() {
                    return Err(AppError::Config(format!(
                        "Feed '{}': at least one pair is required",
                        c.source
                    )));
                }
            }
            FeedConfig::Rest(c) => {
                if c.interval_secs == 0 {
                    return Err(AppError::Config(format!(
                        "Feed '{}': interval_secs must be > 0",
                        c.source
                    )));
                }
                if !c.price_pointer.starts_with('/') {
                    return Err(AppError::Config(format!(
                        "Feed '{}': price_pointer must be a JSON pointer starting with '/' (got '{}')",
                        c.source, c.price_pointer
                    )));
                }
            }
            FeedConfig::Onchain(c) => {
                if c.interval_secs == 0 {
                    return Err(AppError::Config(format!(
                        "Feed '{}': interval_secs must be > 0",
                        c.source
                    )));
                }
                c.validate()?;
            }
            FeedConfig::Relay(_) => {}
        }

        Ok(())
    }
}

/// Spread evaluation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default = "default_eval_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub pairs: Vec<SpreadPairConfig>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_eval_interval_secs(),
            pairs: Vec::new(),
        }
    }
}

/// Periodic rebroadcast and history sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "price_history_capacity")]
    pub price_history: usize,
    #[serde(default = "spread_history_capacity")]
    pub spread_history: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            price_history: price_history_capacity(),
            spread_history: spread_history_capacity(),
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub relay: RelayConfig,
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl AppConfig {
    /// Validate cross-section rules
    pub fn validate(&self) -> Result<()> {
        // Rule: at least one feed
        if self.feeds.is_empty() {
            return Err(AppError::Config(
                "Configuration must contain at least one feed".to_string(),
            ));
        }

        // Rule: feed sources are unique
        let mut seen = HashSet::new();
        for feed in &self.feeds {
            feed.validate()?;
            if !seen.insert(feed.source()) {
                return Err(AppError::Config(format!(
                    "Duplicate feed source '{}'",
                    feed.source()
                )));
            }
        }

        if self.relay.queue_capacity == 0 {
            return Err(AppError::Config(
                "relay.queue_capacity must be > 0".to_string(),
            ));
        }

        if self.evaluator.interval_secs == 0 || self.monitoring.interval_secs == 0 {
            return Err(AppError::Config(
                "evaluator.interval_secs and monitoring.interval_secs must be > 0".to_string(),
            ));
        }

        let provided: HashSet<&str> = self
            .feeds
            .iter()
            .flat_map(|f| f.provided_sources())
            .collect();

        for pair in &self.evaluator.pairs {
            if !pair.threshold.is_finite() || pair.threshold < 0.0 {
                return Err(AppError::Config(format!(
                    "Pair '{}': threshold must be a finite value >= 0 (got {})",
                    pair.name, pair.threshold
                )));
            }

            // Rule: every leg reads a source some feed writes
            for leg in [&pair.leg_a, &pair.leg_b] {
                for source_ref in leg.sources() {
                    if !provided.contains(source_ref.source.as_str()) {
                        return Err(AppError::Config(format!(
                            "Pair '{}': leg references unknown source '{}'",
                            pair.name, source_ref.source
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
