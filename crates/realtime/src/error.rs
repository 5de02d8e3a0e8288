//! Realtime client error types

use crate::connection::ConnectionState;

/// Transport-level failure
///
/// Everything here is retryable: the connection manager answers any of these
/// with a scheduled reconnect unless the client was explicitly disconnected.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    #[error("Timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed (code {code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },

    #[error("TLS error: {0}")]
    Tls(String),
}

/// Failure to serialize our own traffic
///
/// Only the outbound direction can produce one of these; inbound decoding is
/// total and surfaces malformed frames to subscribers as an `Error` event.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Synchronous rejection returned by `send`
///
/// Commands are never buffered for later delivery; a client that is not
/// currently connected gets the rejection immediately.
#[derive(Debug, thiserror::Error)]
pub enum CommandRejected {
    #[error("Not connected (state: {state})")]
    NotConnected { state: ConnectionState },

    #[error("Connection is shutting down")]
    ChannelClosed,
}

/// Top-level error for embedders that funnel everything into one type
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Rejected(#[from] CommandRejected),
}

/// Result type alias for realtime operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;
