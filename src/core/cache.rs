//! Latest-quote cache shared by feeds, the evaluator and the relay.
//!
//! Stores `HashMap<(source, pair), PriceQuote>`; one entry per key,
//! last write wins. Absence is `None`, never a zero price.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::core::types::{PriceQuote, SourceRef};

/// Shared price cache. Wrap in `Arc` and hand to every component.
#[derive(Debug, Default)]
pub struct PriceCache {
    quotes: RwLock<HashMap<SourceRef, PriceQuote>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a quote, replacing any previous one for the same
    /// `(source, pair)`. Returns the replaced quote.
    pub async fn update(&self, quote: PriceQuote) -> Option<PriceQuote> {
        let key = quote.key();
        self.quotes.write().await.insert(key, quote)
    }

    /// Latest quote for `(source, pair)`, if any has been seen.
    pub async fn get(&self, source: &str, pair: &str) -> Option<PriceQuote> {
        self.get_ref(&SourceRef::new(source, pair)).await
    }

    pub async fn get_ref(&self, key: &SourceRef) -> Option<PriceQuote> {
        self.quotes.read().await.get(key).cloned()
    }

    /// All cached quotes, ordered by source then pair.
    pub async fn snapshot(&self) -> Vec<PriceQuote> {
        let guard = self.quotes.read().await;
        let mut quotes: Vec<PriceQuote> = guard.values().cloned().collect();
        drop(guard);
        quotes.sort_by(|a, b| (&a.source, &a.pair).cmp(&(&b.source, &b.pair)));
        quotes
    }

    pub async fn len(&self) -> usize {
        self.quotes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.quotes.read().await.is_empty()
    }
}
