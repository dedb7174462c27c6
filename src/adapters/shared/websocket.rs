//! Shared WebSocket connection helpers
//!
//! Provides TLS-enabled WebSocket connection utilities used by all
//! streaming feeds. Plain `ws://` URLs (local relays, tests) connect
//! without TLS through the same call.

use std::time::Duration;

use tokio_tungstenite::{
    connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream,
};

use crate::adapters::errors::ExchangeError;

/// Type alias for the WebSocket stream with optional TLS
pub type TlsWebSocketStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connect to a WebSocket endpoint with TLS (TLSv1.2 minimum)
///
/// # Arguments
/// * `url` - WebSocket URL to connect to (`wss://` or `ws://`)
/// * `timeout` - Upper bound on TCP + TLS + upgrade handshake
///
/// # Returns
/// * `Ok(TlsWebSocketStream)` - Connected WebSocket stream
/// * `Err(ExchangeError)` - Connection, TLS or timeout error
pub async fn connect_tls(
    url: &str,
    timeout: Duration,
) -> Result<TlsWebSocketStream, ExchangeError> {
    let tls = native_tls::TlsConnector::builder()
        .min_protocol_version(Some(native_tls::Protocol::Tlsv12))
        .build()
        .map_err(|e| ExchangeError::ConnectionFailed(format!("TLS error: {}", e)))?;

    let handshake = connect_async_tls_with_config(url, None, false, Some(Connector::NativeTls(tls)));

    let (ws_stream, _response) = tokio::time::timeout(timeout, handshake)
        .await
        .map_err(|_| ExchangeError::NetworkTimeout(timeout.as_millis() as u64))?
        .map_err(|e| ExchangeError::WebSocket(Box::new(e)))?;

    Ok(ws_stream)
}
