//! Shared helpers for price feed adapters
//!
//! This module provides common utilities for WebSocket connection management,
//! HTTP access, reconnection timing and rate-limit retries.

pub mod http;
pub mod reconnect;
pub mod websocket;

pub use http::{create_http_client, get_json, parse_price_value};
pub use reconnect::{retry_rate_limited, ReconnectConfig};
pub use websocket::{connect_tls, TlsWebSocketStream};
