use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use spread_sentry::core::evaluator::evaluate_pair;
use spread_sentry::core::{PriceCache, PriceQuote, PriceRef, SourceRef, SpreadEvaluator, SpreadPairConfig};

fn direct_pair(threshold: f64) -> SpreadPairConfig {
    SpreadPairConfig {
        name: "BTC/USD".into(),
        leg_a: PriceRef::direct("Kraken", "BTC/USD"),
        leg_b: PriceRef::direct("Coinbase", "BTC/USD"),
        threshold,
    }
}

fn bench_evaluate_pair(c: &mut Criterion) {
    c.bench_function("evaluate_pair", |b| {
        let pair = direct_pair(100.0);
        let now = Utc::now();

        b.iter(|| {
            black_box(evaluate_pair(
                black_box(&pair),
                black_box(95000.0),
                black_box(94850.0),
                now,
            ));
        });
    });
}

fn bench_evaluate_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");

    let cache = PriceCache::new();
    rt.block_on(async {
        cache.update(PriceQuote::new("Kraken", "BTC/USD", 95000.0)).await;
        cache.update(PriceQuote::new("Kraken", "BNB/USD", 600.0)).await;
        cache.update(PriceQuote::new("Coinbase", "BTC/USD", 94850.0)).await;
        cache.update(PriceQuote::new("PancakeSwap", "BTC/BNB", 158.2)).await;
    });

    let mut pairs: Vec<SpreadPairConfig> = (0..8).map(|_| direct_pair(100.0)).collect();
    pairs.push(SpreadPairConfig {
        name: "BTC via BNB".into(),
        leg_a: PriceRef::cross(
            SourceRef::new("PancakeSwap", "BTC/BNB"),
            SourceRef::new("Kraken", "BNB/USD"),
        ),
        leg_b: PriceRef::direct("Kraken", "BTC/USD"),
        threshold: 100.0,
    });
    let evaluator = SpreadEvaluator::new(pairs);

    c.bench_function("evaluate_cycle_9_pairs", |b| {
        b.iter(|| {
            black_box(rt.block_on(evaluator.evaluate(black_box(&cache))));
        });
    });
}

criterion_group!(benches, bench_evaluate_pair, bench_evaluate_cycle);
criterion_main!(benches);
