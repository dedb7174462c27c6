//! Reconnect and retry timing shared by the feed drivers and adapters
//!
//! - [`ReconnectConfig`]: delay before a dropped stream reconnects. The
//!   default multiplier of `1.0` gives a fixed delay; anything above grows
//!   the delay exponentially up to `max_delay_ms`.
//! - [`retry_rate_limited`]: re-runs a request while the source answers
//!   HTTP 429, doubling the wait each time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::config::constants::{max_reconnect_delay, reconnect_delay};

fn default_initial_delay_ms() -> u64 {
    reconnect_delay().as_millis() as u64
}

fn default_max_delay_ms() -> u64 {
    max_reconnect_delay().as_millis() as u64
}

fn default_multiplier() -> f64 {
    1.0
}

/// Configuration for stream reconnection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Growth factor per consecutive failure (1.0 = fixed delay)
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
    /// Maximum delay cap in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Random jitter added to each delay (0 disables)
    #[serde(default)]
    pub jitter_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: 0,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect number `attempt` (1-based).
    ///
    /// `initial * multiplier^(attempt-1)`, capped at `max_delay_ms`, plus
    /// up to `jitter_ms` of random jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let base = self.initial_delay_ms as f64 * self.backoff_multiplier.max(1.0).powi(exp);
        let capped = base.min(self.max_delay_ms.max(self.initial_delay_ms) as f64) as u64;
        let jitter = if self.jitter_ms > 0 {
            rand::random::<u64>() % self.jitter_ms
        } else {
            0
        };
        Duration::from_millis(capped + jitter)
    }
}

/// Run `request_fn`, retrying only on [`ExchangeError::RateLimited`].
///
/// Makes at most `max_attempts` calls. After failed attempt `n` it waits
/// `base_delay * 2^(n-1)`. Any other error is returned immediately.
///
/// # Example
/// ```ignore
/// let body = retry_rate_limited(3, Duration::from_secs(5), "CoinGecko", || async {
///     self.fetch_once().await
/// }).await?;
/// ```
pub async fn retry_rate_limited<T, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    source_name: &str,
    mut request_fn: F,
) -> ExchangeResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ExchangeResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt: u32 = 1;
    loop {
        match request_fn().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limited() && attempt < max_attempts => {
                let delay = base_delay.saturating_mul(1u32 << (attempt - 1).min(16));
                tracing::warn!(
                    source = %source_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) if e.is_rate_limited() => {
                return Err(ExchangeError::RateLimited(format!(
                    "{} still rate limited after {} attempts",
                    source_name, max_attempts
                )));
            }
            Err(e) => return Err(e),
        }
    }
}
