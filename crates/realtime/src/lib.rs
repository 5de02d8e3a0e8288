//! TutorLink Realtime Client
//!
//! This crate keeps one WebSocket connection to the TutorLink chat service
//! alive on behalf of a client: heartbeats, reconnection with backoff, typed
//! wire events, and the consumer-side state derived from them.

pub mod backoff;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod presence;
pub mod receipts;
pub mod transport;
pub mod typing;

pub use backoff::ReconnectPolicy;
pub use config::RealtimeConfig;
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use dispatcher::{EventDispatcher, SubscriptionHandle};
pub use error::{CommandRejected, ProtocolError, RealtimeError, RealtimeResult, TransportError};
pub use events::{InboundEvent, InboundEventKind, OutboundCommand};
pub use presence::{PresenceRecord, PresenceTracker};
pub use receipts::{ReadReceiptTracker, ReceiptRecord};
pub use transport::{Transport, TransportPair, TransportSink, TransportStream, WebSocketTransport};
pub use typing::{TypingDebounce, TypingTracker};
