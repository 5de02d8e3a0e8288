//! Transport abstraction between the connection driver and the wire
//!
//! The driver works against [`Transport`] so connection behavior can be
//! exercised without a server. The production implementation rides on
//! `tokio-tungstenite`; the socket is split into independent sink and
//! stream halves so writes and reads never contend for one object.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};

use crate::error::TransportError;

// =============================================================================
// Traits
// =============================================================================

/// Connected socket halves handed to the driver
pub struct TransportPair {
    pub sink: Box<dyn TransportSink>,
    pub stream: Box<dyn TransportStream>,
}

/// Opens realtime connections
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<TransportPair, TransportError>;
}

/// Write half of an open connection
#[async_trait]
pub trait TransportSink: Send {
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Best-effort close handshake; errors are ignored
    async fn close(&mut self);
}

/// Read half of an open connection
///
/// `recv` yields text frames until the connection ends: `None` for a clean
/// end of stream, `Some(Err(_))` when the peer closed or the wire failed.
#[async_trait]
pub trait TransportStream: Send {
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;
}

// =============================================================================
// WebSocket implementation
// =============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production transport over tokio-tungstenite
#[derive(Debug, Default, Clone)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<TransportPair, TransportError> {
        // The query string carries the auth token; keep it out of logs
        let endpoint = url.split('?').next().unwrap_or(url);
        tracing::debug!(endpoint = %endpoint, "Opening WebSocket");

        let (socket, response) = connect_async(url).await.map_err(map_ws_error)?;
        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        let (write, read) = socket.split();
        Ok(TransportPair {
            sink: Box::new(WebSocketSink { write }),
            stream: Box::new(WebSocketReader { read }),
        })
    }
}

struct WebSocketSink {
    write: SplitSink<WsStream, tungstenite::Message>,
}

#[async_trait]
impl TransportSink for WebSocketSink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.write
            .send(tungstenite::Message::text(frame))
            .await
            .map_err(map_ws_error)
    }

    async fn close(&mut self) {
        if let Err(err) = self.write.close().await {
            tracing::debug!(error = %err, "WebSocket close handshake failed");
        }
    }
}

struct WebSocketReader {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl TransportStream for WebSocketReader {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        while let Some(item) = self.read.next().await {
            match item {
                Ok(tungstenite::Message::Text(text)) => return Some(Ok(text)),
                Ok(tungstenite::Message::Binary(payload)) => {
                    tracing::debug!(bytes = payload.len(), "Ignoring binary frame");
                }
                Ok(tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_)) => {
                    // Socket-level keepalive; tungstenite answers pings itself
                }
                Ok(tungstenite::Message::Close(frame)) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                        None => (None, String::new()),
                    };
                    return Some(Err(TransportError::Closed { code, reason }));
                }
                Ok(tungstenite::Message::Frame(_)) => {}
                Err(err) => return Some(Err(map_ws_error(err))),
            }
        }
        None
    }
}

fn map_ws_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::Io(io) => TransportError::Io(io),
        tungstenite::Error::Tls(tls) => TransportError::Tls(tls.to_string()),
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::Closed {
                code: None,
                reason: "connection closed".to_string(),
            }
        }
        other => TransportError::Handshake(other.to_string()),
    }
}

// =============================================================================
// Scripted transport for tests
// =============================================================================
