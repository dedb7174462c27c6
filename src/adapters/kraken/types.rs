//! Kraken Types
//!
//! Frame shapes of the Kraken v1 public WebSocket.
//!
//! Ticker frames are arrays:
//!   `[channelID, {"c": ["<last price>", "<lot volume>"], ...}, "ticker", "XBT/USD"]`
//! Everything else (`heartbeat`, `systemStatus`, `subscriptionStatus`) is
//! an object carrying an `event` field.

use serde::{Deserialize, Serialize};

use crate::adapters::errors::{ExchangeError, ExchangeResult};

// =============================================================================
// Outbound
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct KrakenSubscription {
    pub name: &'static str,
}

/// `{"event":"subscribe","pair":[...],"subscription":{"name":"ticker"}}`
#[derive(Debug, Clone, Serialize)]
pub struct KrakenSubscribeRequest {
    pub event: &'static str,
    pub pair: Vec<String>,
    pub subscription: KrakenSubscription,
}

impl KrakenSubscribeRequest {
    pub fn ticker(pairs: Vec<String>) -> Self {
        Self {
            event: "subscribe",
            pair: pairs,
            subscription: KrakenSubscription { name: "ticker" },
        }
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// Ticker payload; only the last-trade field is read.
#[derive(Debug, Clone, Deserialize)]
pub struct KrakenTickerData {
    /// `[price, lot volume]`
    pub c: (String, String),
}

/// Object frames (`heartbeat`, `systemStatus`, `subscriptionStatus`, ...)
#[derive(Debug, Clone, Deserialize)]
pub struct KrakenEvent {
    pub event: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub pair: Option<String>,
    #[serde(default, rename = "errorMessage")]
    pub error_message: Option<String>,
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum KrakenFrame {
    /// Last trade price for an exchange pair
    Ticker { pair: String, price: f64 },
    /// Control / status frame with nothing to cache
    Event(String),
}

/// Decode one text frame.
pub fn parse_frame(text: &str) -> ExchangeResult<KrakenFrame> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| ExchangeError::InvalidResponse(format!("Kraken frame is not JSON: {}", e)))?;

    match value {
        serde_json::Value::Object(_) => {
            let event: KrakenEvent = serde_json::from_value(value).map_err(|e| {
                ExchangeError::InvalidResponse(format!("Kraken event frame: {}", e))
            })?;
            if event.event == "subscriptionStatus" && event.status.as_deref() == Some("error") {
                return Err(ExchangeError::SubscriptionFailed {
                    pair: event.pair.unwrap_or_default(),
                    reason: event.error_message.unwrap_or_else(|| "unknown".to_string()),
                });
            }
            Ok(KrakenFrame::Event(event.event))
        }
        serde_json::Value::Array(items) => parse_ticker_array(items),
        other => Err(ExchangeError::InvalidResponse(format!(
            "Unexpected Kraken frame: {}",
            other
        ))),
    }
}

fn parse_ticker_array(items: Vec<serde_json::Value>) -> ExchangeResult<KrakenFrame> {
    if items.len() < 4 {
        return Err(ExchangeError::InvalidResponse(format!(
            "Kraken array frame has {} elements, expected 4",
            items.len()
        )));
    }

    let channel = items[items.len() - 2].as_str().unwrap_or_default();
    if channel != "ticker" {
        return Ok(KrakenFrame::Event(channel.to_string()));
    }

    let pair = items[items.len() - 1]
        .as_str()
        .ok_or_else(|| ExchangeError::InvalidResponse("Kraken ticker without pair".into()))?
        .to_string();

    let data: KrakenTickerData = serde_json::from_value(items[1].clone())
        .map_err(|e| ExchangeError::InvalidResponse(format!("Kraken ticker payload: {}", e)))?;

    let price = data.c.0.parse::<f64>().map_err(|e| {
        ExchangeError::InvalidResponse(format!("Invalid Kraken last price '{}': {}", data.c.0, e))
    })?;

    Ok(KrakenFrame::Ticker { pair, price })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICKER: &str = r#"[340,{"a":["95001.00000",1,"1.000"],"b":["94999.90000",0,"0.500"],"c":["95000.00000","0.00100000"],"v":["1.0","2.0"],"p":["1","2"],"t":[1,2],"l":["1","2"],"h":["1","2"],"o":["1","2"]},"ticker","XBT/USD"]"#;

    #[test]
    fn test_subscribe_request_shape() {
        let req = KrakenSubscribeRequest::ticker(vec!["XBT/USD".into(), "BNB/USD".into()]);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "subscribe",
                "pair": ["XBT/USD", "BNB/USD"],
                "subscription": {"name": "ticker"}
            })
        );
    }

    #[test]
    fn test_parse_ticker() {
        let frame = parse_frame(TICKER).unwrap();
        assert_eq!(
            frame,
            KrakenFrame::Ticker { pair: "XBT/USD".into(), price: 95000.0 }
        );
    }

    #[test]
    fn test_parse_heartbeat() {
        assert_eq!(
            parse_frame(r#"{"event":"heartbeat"}"#).unwrap(),
            KrakenFrame::Event("heartbeat".into())
        );
    }

    #[test]
    fn test_subscription_error_surfaces() {
        let raw = r#"{"event":"subscriptionStatus","status":"error","pair":"FOO/BAR","errorMessage":"Currency pair not supported"}"#;
        let err = parse_frame(raw).unwrap_err();
        assert!(matches!(err, ExchangeError::SubscriptionFailed { .. }));
        assert!(err.to_string().contains("FOO/BAR"));
    }

    #[test]
    fn test_malformed_frames_rejected() {
        assert!(parse_frame("not json").is_err());
        assert!(parse_frame("[1, 2]").is_err());
        assert!(parse_frame(r#"[1,{"c":["abc","1"]},"ticker","XBT/USD"]"#).is_err());
        assert!(parse_frame("42").is_err());
    }
}
