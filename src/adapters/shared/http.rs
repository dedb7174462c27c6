//! Shared HTTP client builder and response helpers for polling feeds.

use std::time::Duration;

use reqwest::StatusCode;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

/// HTTP connection timeout (milliseconds), fail fast if host unreachable
const HTTP_CONNECT_TIMEOUT_MS: u64 = 3_000;
/// Max idle connections per host in connection pool
const HTTP_POOL_MAX_IDLE: usize = 2;
/// How long idle connections stay in the pool (seconds)
const HTTP_POOL_IDLE_TIMEOUT_SECS: u64 = 60;

/// Build a pooled HTTP client whose every request is bounded by `timeout`.
pub fn create_http_client(source_name: &str, timeout: Duration) -> reqwest::Client {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_millis(HTTP_CONNECT_TIMEOUT_MS).min(timeout))
        .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE)
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECS))
        .user_agent(concat!("spread-sentry/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());
    tracing::debug!(
        phase = "init",
        source = %source_name,
        timeout_ms = timeout.as_millis() as u64,
        "HTTP client configured"
    );
    client
}

/// GET `url` and decode the body as JSON.
///
/// 429 becomes [`ExchangeError::RateLimited`], any other non-2xx status an
/// [`ExchangeError::InvalidResponse`], and a client-side timeout an
/// [`ExchangeError::NetworkTimeout`].
pub async fn get_json(
    client: &reqwest::Client,
    source_name: &str,
    url: &str,
    timeout: Duration,
) -> ExchangeResult<serde_json::Value> {
    let response = client.get(url).send().await.map_err(|e| map_send_error(e, timeout))?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ExchangeError::RateLimited(source_name.to_string()));
    }
    if !status.is_success() {
        return Err(ExchangeError::InvalidResponse(format!(
            "{} returned HTTP {}",
            source_name, status
        )));
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| ExchangeError::InvalidResponse(format!("{}: body is not JSON: {}", source_name, e)))
}

fn map_send_error(e: reqwest::Error, timeout: Duration) -> ExchangeError {
    if e.is_timeout() {
        ExchangeError::NetworkTimeout(timeout.as_millis() as u64)
    } else {
        ExchangeError::Http(e)
    }
}

/// Read a price that may be encoded as a JSON number or a numeric string.
pub fn parse_price_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
