//! Application-wide constants and configuration defaults
//!
//! This module centralizes all hardcoded values to make them configurable
//! and maintainable. Values can be overridden via environment variables;
//! they act as defaults for any field left out of `config.yaml`.

use std::time::Duration;

use crate::core::history::{DEFAULT_PRICE_HISTORY, DEFAULT_SPREAD_HISTORY};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// =============================================================================
// Files
// =============================================================================

/// Path of the YAML configuration file (default: `config.yaml`)
///
/// Environment variable: `SPREAD_SENTRY_CONFIG`
pub fn config_path() -> String {
    std::env::var("SPREAD_SENTRY_CONFIG").unwrap_or_else(|_| "config.yaml".to_string())
}

// =============================================================================
// Relay Configuration
// =============================================================================

/// Relay listen port (default: 8081)
///
/// Environment variable: `RELAY_PORT`
pub fn relay_port() -> u16 {
    env_or("RELAY_PORT", 8081)
}

/// Per-subscriber outbound queue depth (default: 256 messages)
///
/// Environment variable: `SUBSCRIBER_QUEUE_CAPACITY`
pub fn subscriber_queue_capacity() -> usize {
    env_or("SUBSCRIBER_QUEUE_CAPACITY", 256)
}

// =============================================================================
// Feed Timing
// =============================================================================

/// Timeout applied to every network call (default: 10 seconds)
///
/// Environment variable: `FEED_REQUEST_TIMEOUT_SECS`
pub fn feed_request_timeout() -> Duration {
    Duration::from_secs(env_or("FEED_REQUEST_TIMEOUT_SECS", 10))
}

/// Delay before a dropped stream reconnects (default: 5 seconds)
///
/// Environment variable: `RECONNECT_DELAY_SECS`
pub fn reconnect_delay() -> Duration {
    Duration::from_secs(env_or("RECONNECT_DELAY_SECS", 5))
}

/// Upper bound on reconnect backoff (default: 60 seconds)
///
/// Environment variable: `MAX_RECONNECT_DELAY_SECS`
pub fn max_reconnect_delay() -> Duration {
    Duration::from_secs(env_or("MAX_RECONNECT_DELAY_SECS", 60))
}

// =============================================================================
// Memory Management
// =============================================================================

/// Price history ring buffer size (default: 1000)
///
/// Environment variable: `PRICE_HISTORY_CAPACITY`
pub fn price_history_capacity() -> usize {
    env_or("PRICE_HISTORY_CAPACITY", DEFAULT_PRICE_HISTORY)
}

/// Spread history ring buffer size (default: 500)
///
/// Environment variable: `SPREAD_HISTORY_CAPACITY`
pub fn spread_history_capacity() -> usize {
    env_or("SPREAD_HISTORY_CAPACITY", DEFAULT_SPREAD_HISTORY)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Print all configuration values (for debugging/startup logs)
pub fn log_configuration() {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Files:");
    tracing::info!("  - Config path: {}", config_path());

    tracing::info!("Relay:");
    tracing::info!("  - Default port: {}", relay_port());
    tracing::info!("  - Subscriber queue capacity: {}", subscriber_queue_capacity());

    tracing::info!("Feeds:");
    tracing::info!("  - Request timeout: {:?}", feed_request_timeout());
    tracing::info!("  - Reconnect delay: {:?}", reconnect_delay());
    tracing::info!("  - Max reconnect delay: {:?}", max_reconnect_delay());

    tracing::info!("Memory Management:");
    tracing::info!("  - Price history capacity: {}", price_history_capacity());
    tracing::info!("  - Spread history capacity: {}", spread_history_capacity());
    tracing::info!("==================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial(env)]
    fn test_default_values() {
        assert_eq!(relay_port(), 8081);
        assert_eq!(subscriber_queue_capacity(), 256);
        assert_eq!(feed_request_timeout(), Duration::from_secs(10));
        assert_eq!(reconnect_delay(), Duration::from_secs(5));
        assert_eq!(price_history_capacity(), DEFAULT_PRICE_HISTORY);
        assert_eq!(spread_history_capacity(), DEFAULT_SPREAD_HISTORY);
    }

    #[test]
    #[serial(env)]
    fn test_history_capacity_env_override() {
        std::env::set_var("SPREAD_HISTORY_CAPACITY", "32");
        assert_eq!(spread_history_capacity(), 32);
        assert_eq!(price_history_capacity(), 1000);
        std::env::remove_var("SPREAD_HISTORY_CAPACITY");
    }

    #[test]
    #[serial(env)]
    fn test_env_override() {
        std::env::set_var("RELAY_PORT", "9090");
        assert_eq!(relay_port(), 9090);
        std::env::remove_var("RELAY_PORT");
    }

    #[test]
    #[serial(env)]
    fn test_unparsable_env_falls_back_to_default() {
        std::env::set_var("SUBSCRIBER_QUEUE_CAPACITY", "lots");
        assert_eq!(subscriber_queue_capacity(), 256);
        std::env::remove_var("SUBSCRIBER_QUEUE_CAPACITY");
    }
}
