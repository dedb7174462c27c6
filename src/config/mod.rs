//! Configuration module
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `FeedConfig`, `RelayConfig`, ...)
//! - YAML loading functionality (`load_config`)
//! - Logging initialisation
//! - Application constants with environment variable overrides

pub mod constants;
mod loader;
pub mod logging;
mod types;

pub use types::{AppConfig, EvaluatorConfig, FeedConfig, MonitoringConfig, RelayConfig};

pub use loader::{load_config, load_config_from_str};
pub use logging::init_logging;
