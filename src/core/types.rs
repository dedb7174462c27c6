//! Core data types for the quote cache, spread evaluation and relay pipeline.
//!
//! These types define the vocabulary shared by feeds, the evaluator and the
//! relay, plus the JSON shapes that go out on the wire.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Price Quote (from a single source)
// =============================================================================

/// Normalised quote emitted by a feed adapter.
///
/// Immutable once created. On the wire the source is named `exchange`;
/// the pair is always sent alongside it, so consumers that key on the
/// exchange name alone cannot tell two pairs from the same venue apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Source identifier (e.g. "Kraken", "Coinbase", "PancakeSwap")
    #[serde(rename = "exchange")]
    pub source: Arc<str>,
    /// Canonical pair name (e.g. "BTC/USD")
    pub pair: Arc<str>,
    /// Last price
    pub price: f64,
    /// When the price was observed
    #[serde(rename = "observedAt", with = "iso_millis")]
    pub observed_at: DateTime<Utc>,
}

impl PriceQuote {
    /// Create a quote observed now.
    pub fn new(source: impl Into<Arc<str>>, pair: impl Into<Arc<str>>, price: f64) -> Self {
        Self::observed(source, pair, price, Utc::now())
    }

    /// Create a quote with an explicit observation time.
    pub fn observed(
        source: impl Into<Arc<str>>,
        pair: impl Into<Arc<str>>,
        price: f64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            pair: pair.into(),
            price,
            observed_at,
        }
    }

    /// A usable price is finite and strictly positive.
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }

    /// Cache key for this quote.
    pub fn key(&self) -> SourceRef {
        SourceRef::new(self.source.as_ref(), self.pair.as_ref())
    }
}

// =============================================================================
// Price references (what a spread leg points at)
// =============================================================================

/// `(source, pair)` key into the price cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: String,
    pub pair: String,
}

impl SourceRef {
    pub fn new(source: impl Into<String>, pair: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            pair: pair.into(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.source, self.pair)
    }
}

/// One leg of a spread: either a cached quote or the product of two.
///
/// A cross leg turns e.g. `PancakeSwap BTC/BNB × Kraken BNB/USD` into a
/// synthetic BTC/USD price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceRef {
    Cross { base: SourceRef, quote: SourceRef },
    Direct(SourceRef),
}

impl PriceRef {
    pub fn direct(source: impl Into<String>, pair: impl Into<String>) -> Self {
        PriceRef::Direct(SourceRef::new(source, pair))
    }

    pub fn cross(base: SourceRef, quote: SourceRef) -> Self {
        PriceRef::Cross { base, quote }
    }

    /// Venue a trade on this leg would go to. For a cross leg that is the
    /// base quote's source.
    pub fn venue(&self) -> &str {
        match self {
            PriceRef::Direct(r) => &r.source,
            PriceRef::Cross { base, .. } => &base.source,
        }
    }

    /// Every cache key this leg reads.
    pub fn sources(&self) -> Vec<&SourceRef> {
        match self {
            PriceRef::Direct(r) => vec![r],
            PriceRef::Cross { base, quote } => vec![base, quote],
        }
    }
}

impl fmt::Display for PriceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceRef::Direct(r) => write!(f, "{}", r),
            PriceRef::Cross { base, quote } => write!(f, "{} x {}", base, quote),
        }
    }
}

// =============================================================================
// Spread Sample / Opportunity
// =============================================================================

/// Spread computed between two legs in one evaluator cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadSample {
    /// Configured spread name (e.g. "Kraken-Coinbase")
    pub pair: String,
    pub leg_a: PriceRef,
    pub leg_b: PriceRef,
    pub price_a: f64,
    pub price_b: f64,
    /// Absolute difference `|price_a - price_b|`
    pub spread: f64,
    #[serde(with = "iso_millis")]
    pub computed_at: DateTime<Utc>,
}

/// Spread whose magnitude exceeded the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub pair: String,
    pub spread: f64,
    /// Cheaper side
    pub buy_source: String,
    /// More expensive side
    pub sell_source: String,
    pub buy_price: f64,
    pub sell_price: f64,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Monitoring
// =============================================================================

/// Latency / freshness record for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringData {
    /// Milliseconds spent producing the last quote
    pub latency: u64,
    /// Epoch milliseconds of the last quote
    pub last_update: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringUpdate {
    pub exchange: String,
    pub data: MonitoringData,
}

// =============================================================================
// Relay events and wire envelope
// =============================================================================

/// Event types carried by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Price,
    Log,
    Spread,
    Opportunity,
    Monitoring,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Price => "price",
            EventKind::Log => "log",
            EventKind::Spread => "spread",
            EventKind::Opportunity => "opportunity",
            EventKind::Monitoring => "monitoring",
        };
        f.write_str(s)
    }
}

/// Typed event published to the relay.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    Price(PriceQuote),
    Log(String),
    Spread(SpreadSample),
    Opportunity(Opportunity),
    Monitoring(MonitoringUpdate),
}

impl RelayEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RelayEvent::Price(_) => EventKind::Price,
            RelayEvent::Log(_) => EventKind::Log,
            RelayEvent::Spread(_) => EventKind::Spread,
            RelayEvent::Opportunity(_) => EventKind::Opportunity,
            RelayEvent::Monitoring(_) => EventKind::Monitoring,
        }
    }

    /// Wrap the event in a wire envelope stamped now.
    pub fn into_envelope(self) -> Result<RelayEnvelope, serde_json::Error> {
        let kind = self.kind();
        let message = match self {
            RelayEvent::Price(q) => serde_json::to_value(q)?,
            RelayEvent::Log(line) => serde_json::Value::String(line),
            RelayEvent::Spread(s) => serde_json::to_value(s)?,
            RelayEvent::Opportunity(o) => serde_json::to_value(o)?,
            RelayEvent::Monitoring(m) => serde_json::to_value(m)?,
        };
        Ok(RelayEnvelope {
            kind,
            message,
            timestamp: iso_now(),
        })
    }
}

/// `{"type": ..., "message": ..., "timestamp": ...}` as sent to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub message: serde_json::Value,
    pub timestamp: String,
}

// =============================================================================
// Utility
// =============================================================================

/// Get current time in milliseconds since epoch.
#[inline]
pub fn current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// ISO-8601 UTC with millisecond precision, e.g. `2025-01-01T00:00:00.000Z`.
pub fn to_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn iso_now() -> String {
    to_iso(&Utc::now())
}

/// Convert epoch milliseconds to a UTC timestamp.
pub fn from_millis(ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .unwrap_or_else(Utc::now)
}

pub(crate) mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::to_iso(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        DateTime::<Utc>::deserialize(d)
    }
}
