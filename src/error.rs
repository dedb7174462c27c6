//! Application error type
//!
//! Feed-level failures stay [`ExchangeError`] inside the adapters and are
//! retried there. Only startup failures (bad config, unusable feed
//! definition, relay socket) surface as [`AppError`].

use crate::adapters::errors::ExchangeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A feed could not be built
    #[error("Feed error: {0}")]
    Exchange(#[from] ExchangeError),

    /// Config file access, relay bind or serve failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
