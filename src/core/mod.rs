//! Core module - Quote cache, spread evaluation, history and monitoring
//!
//! # Module Architecture
//!
//! This module uses **explicit re-exports** instead of glob exports (`pub use module::*`)
//! to provide better API visibility and prevent accidental public API changes.
//!
//! ## Usage
//! Prefer importing from `crate::core`:
//! ```ignore
//! use crate::core::{PriceCache, SpreadEvaluator, PriceQuote};
//! ```

pub mod cache;
pub mod evaluator;
pub mod history;
pub mod monitoring;
pub mod types;

pub use types::{
    current_time_ms, EventKind, MonitoringData, MonitoringUpdate, Opportunity, PriceQuote,
    PriceRef, RelayEnvelope, RelayEvent, SourceRef, SpreadSample,
};
pub use cache::PriceCache;
pub use evaluator::{run_evaluator, EvaluationCycle, SpreadEvaluator, SpreadPairConfig};
pub use history::HistoryBuffer;
pub use monitoring::{run_periodic_broadcast, FeedContext, MonitoringRegistry};
