//! spread_sentry - cross-venue price monitor
//!
//! Collects quotes from exchange streams, REST endpoints and on-chain AMM
//! pairs, evaluates configured spreads, and relays everything to WebSocket
//! subscribers.

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod server;

pub use error::AppError;
