//! Spread evaluator.
//!
//! On every cycle, resolves both legs of each configured pair from the
//! cache, computes the absolute spread and reports an opportunity when it
//! exceeds the pair's threshold. Pairs with a missing leg are skipped.
//! There is no deduplication: a persisting opportunity is reported again
//! on every cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use crate::core::cache::PriceCache;
use crate::core::history::HistoryBuffer;
use crate::core::monitoring::MonitoringRegistry;
use crate::core::types::{Opportunity, PriceRef, RelayEvent, SpreadSample};
use crate::server::relay::BroadcastRelay;

/// Default opportunity threshold in quote-currency units.
pub const DEFAULT_THRESHOLD: f64 = 100.0;
/// Default evaluation interval.
pub const DEFAULT_EVAL_INTERVAL: Duration = Duration::from_secs(10);
/// Monitoring name under which the evaluator reports its cycle latency.
pub const EVALUATOR_MONITOR_NAME: &str = "SpreadEvaluator";

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

/// One configured spread: two legs and the threshold for an opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadPairConfig {
    pub name: String,
    pub leg_a: PriceRef,
    pub leg_b: PriceRef,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

/// Output of one evaluation cycle.
#[derive(Debug, Default, Clone)]
pub struct EvaluationCycle {
    pub samples: Vec<SpreadSample>,
    pub opportunities: Vec<Opportunity>,
    /// Names of pairs skipped because a leg had no data
    pub skipped: Vec<String>,
}

/// Stateless evaluator over a fixed set of pairs.
#[derive(Debug, Clone)]
pub struct SpreadEvaluator {
    pairs: Vec<SpreadPairConfig>,
}

impl SpreadEvaluator {
    pub fn new(pairs: Vec<SpreadPairConfig>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[SpreadPairConfig] {
        &self.pairs
    }

    /// Current price of a leg, or `None` if any input is missing.
    pub async fn resolve(cache: &PriceCache, leg: &PriceRef) -> Option<f64> {
        match leg {
            PriceRef::Direct(key) => cache.get_ref(key).await.map(|q| q.price),
            PriceRef::Cross { base, quote } => {
                let base = cache.get_ref(base).await?.price;
                let quote = cache.get_ref(quote).await?.price;
                Some(base * quote)
            }
        }
    }

    /// Evaluate every configured pair against the current cache contents.
    pub async fn evaluate(&self, cache: &PriceCache) -> EvaluationCycle {
        let now = Utc::now();
        let mut cycle = EvaluationCycle::default();

        for pair in &self.pairs {
            let a = Self::resolve(cache, &pair.leg_a).await;
            let b = Self::resolve(cache, &pair.leg_b).await;

            let (price_a, price_b) = match (a, b) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    cycle.skipped.push(pair.name.clone());
                    continue;
                }
            };

            let (sample, opportunity) = evaluate_pair(pair, price_a, price_b, now);
            cycle.samples.push(sample);
            if let Some(opp) = opportunity {
                cycle.opportunities.push(opp);
            }
        }

        cycle
    }
}

/// Compute the spread between two resolved prices.
///
/// The cheaper leg is the buy side; on a tie leg A buys.
pub fn evaluate_pair(
    pair: &SpreadPairConfig,
    price_a: f64,
    price_b: f64,
    now: DateTime<Utc>,
) -> (SpreadSample, Option<Opportunity>) {
    let spread = (price_a - price_b).abs();

    let sample = SpreadSample {
        pair: pair.name.clone(),
        leg_a: pair.leg_a.clone(),
        leg_b: pair.leg_b.clone(),
        price_a,
        price_b,
        spread,
        computed_at: now,
    };

    if spread <= pair.threshold {
        return (sample, None);
    }

    let ((buy_leg, buy_price), (sell_leg, sell_price)) = if price_a <= price_b {
        ((&pair.leg_a, price_a), (&pair.leg_b, price_b))
    } else {
        ((&pair.leg_b, price_b), (&pair.leg_a, price_a))
    };

    let opportunity = Opportunity {
        pair: pair.name.clone(),
        spread,
        buy_source: buy_leg.venue().to_string(),
        sell_source: sell_leg.venue().to_string(),
        buy_price,
        sell_price,
        timestamp: now,
    };

    (sample, Some(opportunity))
}

/// Run the evaluator until shutdown, publishing `spread`, `opportunity`
/// and `monitoring` events after each cycle.
pub async fn run_evaluator(
    evaluator: SpreadEvaluator,
    cache: Arc<PriceCache>,
    relay: Arc<BroadcastRelay>,
    history: Arc<Mutex<HistoryBuffer<SpreadSample>>>,
    monitors: Arc<MonitoringRegistry>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        pairs = evaluator.pairs().len(),
        interval_secs = period.as_secs(),
        "Spread evaluator started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let started = Instant::now();
                let cycle = evaluator.evaluate(&cache).await;
                publish_cycle(&cycle, &relay, &history).await;

                let update = monitors.record(EVALUATOR_MONITOR_NAME, started.elapsed()).await;
                relay.publish(RelayEvent::Monitoring(update));
            }
            _ = shutdown.recv() => {
                info!("Spread evaluator stopped");
                break;
            }
        }
    }
}

/// Record and publish one cycle's samples and opportunities.
pub async fn publish_cycle(
    cycle: &EvaluationCycle,
    relay: &BroadcastRelay,
    history: &Mutex<HistoryBuffer<SpreadSample>>,
) {
    for name in &cycle.skipped {
        debug!(pair = %name, "Skipping spread, missing price data");
    }

    {
        let mut history = history.lock().await;
        for sample in &cycle.samples {
            history.push(sample.clone());
        }
    }

    for sample in &cycle.samples {
        debug!(pair = %sample.pair, spread = sample.spread, "Spread computed");
        relay.publish(RelayEvent::Spread(sample.clone()));
    }

    for opp in &cycle.opportunities {
        info!(
            event_type = "OPPORTUNITY",
            pair = %opp.pair,
            spread = opp.spread,
            buy = %opp.buy_source,
            sell = %opp.sell_source,
            "Arbitrage opportunity detected: buy on {} at {:.2}, sell on {} at {:.2}",
            opp.buy_source,
            opp.buy_price,
            opp.sell_source,
            opp.sell_price
        );
        relay.publish(RelayEvent::Opportunity(opp.clone()));
    }
}
