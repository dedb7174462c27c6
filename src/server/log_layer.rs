//! Tracing layer that forwards log lines to relay subscribers.
//!
//! `on_event()` MUST NOT block: it runs on whatever thread emitted the
//! event, possibly while the relay lock is held. It uses
//! [`BroadcastRelay::try_publish`] and drops the line under contention.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::core::types::RelayEvent;
use crate::server::relay::BroadcastRelay;

/// Lines dropped because the relay lock was contended.
static DROPPED_LOGS: AtomicU64 = AtomicU64::new(0);

pub fn dropped_logs() -> u64 {
    DROPPED_LOGS.load(Ordering::Relaxed)
}

/// Forwards INFO-and-above events from this crate as `log` envelopes.
pub struct RelayLogLayer {
    relay: Arc<BroadcastRelay>,
}

impl RelayLogLayer {
    pub fn new(relay: Arc<BroadcastRelay>) -> Self {
        Self { relay }
    }

    fn forwards(target: &str, level: &Level) -> bool {
        // Relay's own logs would recurse
        *level <= Level::INFO
            && target.starts_with(env!("CARGO_CRATE_NAME"))
            && !target.starts_with(module_path!())
            && !target.ends_with("::relay")
    }
}

impl<S: Subscriber> Layer<S> for RelayLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if !Self::forwards(meta.target(), meta.level()) {
            return;
        }

        let line = format_line(event);
        if self.relay.try_publish(RelayEvent::Log(line)).is_none() {
            DROPPED_LOGS.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// `LEVEL message [k=v, ...]`
pub fn format_line(event: &Event<'_>) -> String {
    let mut message = String::new();
    let mut extra_fields = Vec::new();
    let mut visitor = MessageVisitor {
        message: &mut message,
        extra_fields: &mut extra_fields,
    };
    event.record(&mut visitor);

    let mut line = format!("{} {}", event.metadata().level(), message);
    if !extra_fields.is_empty() {
        line.push_str(" [");
        line.push_str(&extra_fields.join(", "));
        line.push(']');
    }
    line
}

/// Extracts the message and every structured field
struct MessageVisitor<'a> {
    message: &'a mut String,
    extra_fields: &'a mut Vec<String>,
}

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = format!("{:?}", value).trim_matches('"').to_string();
        } else {
            self.extra_fields.push(format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            *self.message = value.to_string();
        } else {
            self.extra_fields.push(format!("{}={}", field.name(), value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{EventKind, RelayEnvelope};
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_forward_filter() {
        let crate_name = env!("CARGO_CRATE_NAME");
        let feed_target = format!("{}::adapters::manager", crate_name);
        let relay_target = format!("{}::server::relay", crate_name);

        assert!(RelayLogLayer::forwards(&feed_target, &Level::INFO));
        assert!(RelayLogLayer::forwards(&feed_target, &Level::WARN));
        assert!(!RelayLogLayer::forwards(&feed_target, &Level::DEBUG));
        assert!(!RelayLogLayer::forwards(&relay_target, &Level::INFO));
        assert!(!RelayLogLayer::forwards(module_path!(), &Level::ERROR));
        assert!(!RelayLogLayer::forwards("hyper::proto", &Level::INFO));
    }

    #[tokio::test]
    async fn test_info_event_reaches_subscriber() {
        let relay = Arc::new(BroadcastRelay::new(8));
        let mut sub = relay.subscribe();
        let subscriber =
            tracing_subscriber::registry().with(RelayLogLayer::new(Arc::clone(&relay)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(
                target: concat!(env!("CARGO_CRATE_NAME"), "::core::evaluator"),
                pair = "BTC/USD",
                "Opportunity detected"
            );
            tracing::debug!(
                target: concat!(env!("CARGO_CRATE_NAME"), "::core::evaluator"),
                "not forwarded"
            );
        });

        let raw = sub.rx.try_recv().unwrap();
        let envelope: RelayEnvelope = serde_json::from_str(&raw).unwrap();
        assert_eq!(envelope.kind, EventKind::Log);
        let text = envelope.message.as_str().unwrap();
        assert!(text.starts_with("INFO Opportunity detected"), "got {}", text);
        assert!(text.contains("pair=BTC/USD"), "got {}", text);
        assert!(sub.rx.try_recv().is_err());
    }
}
