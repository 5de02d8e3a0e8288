//! Connection lifecycle for the realtime channel
//!
//! A [`ConnectionManager`] is a cheap clonable handle; the socket itself is
//! owned by a single driver task. The driver runs the whole lifecycle in one
//! loop: dial, deliver frames to the dispatcher, reconnect with backoff after
//! a drop, and wind down when told. Callers observe progress through a watch
//! channel and never touch the socket directly.
//!
//! # Architecture
//!
//! ```text
//!  ConnectionManager ──connect()───▶ driver task
//!         │                            │  dial ─▶ read frames ─▶ dispatch
//!         │◀────── watch status ───────│  on drop: backoff, dial again
//!         └─send()─▶ outbound queue ───┘
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::backoff::ReconnectPolicy;
use crate::config::RealtimeConfig;
use crate::dispatcher::{EventDispatcher, SubscriptionHandle};
use crate::error::{CommandRejected, TransportError};
use crate::events::{self, InboundEvent, InboundEventKind, OutboundCommand, SessionInfo};
use crate::heartbeat::HeartbeatMonitor;
use crate::transport::{Transport, TransportPair, WebSocketTransport};

// =============================================================================
// Status
// =============================================================================

/// Lifecycle state of the realtime channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Snapshot published on every lifecycle transition
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Consecutive failed dials in the current reconnect cycle
    pub attempt: u32,
    pub last_error: Option<String>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: 0,
            last_error: None,
        }
    }
}

// =============================================================================
// Manager handle
// =============================================================================

/// Handle to the realtime connection
///
/// Clones share one underlying connection and one handler registry.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: RealtimeConfig,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<EventDispatcher>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    outbound: Arc<RwLock<Option<mpsc::UnboundedSender<OutboundCommand>>>>,
    driver: Mutex<Option<DriverHandle>>,
}

struct DriverHandle {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl ConnectionManager {
    /// Create a manager that dials over WebSocket
    pub fn new(config: RealtimeConfig) -> Self {
        Self::with_transport(config, Arc::new(WebSocketTransport))
    }

    /// Create a manager over a caller-supplied transport
    pub fn with_transport(config: RealtimeConfig, transport: Arc<dyn Transport>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            inner: Arc::new(ManagerInner {
                config,
                transport,
                dispatcher: Arc::new(EventDispatcher::default()),
                status: Arc::new(status),
                outbound: Arc::new(RwLock::new(None)),
                driver: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    /// Current lifecycle snapshot
    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.status.borrow().state
    }

    /// Watch lifecycle transitions as they happen
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Register `handler` for one kind of inbound event
    ///
    /// Handlers survive reconnects; they are tied to the manager, not to any
    /// single connection.
    pub fn subscribe<F>(&self, kind: InboundEventKind, handler: F) -> SubscriptionHandle
    where
        F: Fn(&InboundEvent) + Send + Sync + 'static,
    {
        self.inner.dispatcher.subscribe(kind, handler)
    }

    /// Remove a handler; unknown or already-removed handles are ignored
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.inner.dispatcher.unsubscribe(handle);
    }

    /// Start the connection driver
    ///
    /// Idempotent: when a driver is already running this is a no-op, so
    /// racing callers cannot end up with two sockets.
    pub async fn connect(&self) {
        let mut slot = self.inner.driver.lock().await;
        if let Some(handle) = slot.as_ref() {
            if !handle.task.is_finished() {
                tracing::debug!(
                    identity = %self.inner.config.identity,
                    "connect() ignored, driver already running"
                );
                return;
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = Driver {
            config: self.inner.config.clone(),
            transport: Arc::clone(&self.inner.transport),
            dispatcher: Arc::clone(&self.inner.dispatcher),
            status: Arc::clone(&self.inner.status),
            outbound: Arc::clone(&self.inner.outbound),
        };
        let task = tokio::spawn(driver.run(shutdown_rx));
        *slot = Some(DriverHandle {
            task,
            shutdown: shutdown_tx,
        });
    }

    /// Stop the driver and wait for it to finish
    ///
    /// Cancels any pending reconnect timer, so no dial can fire after this
    /// returns. Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        let mut slot = self.inner.driver.lock().await;
        let Some(handle) = slot.take() else {
            tracing::debug!("disconnect() with no driver running");
            return;
        };
        let _ = handle.shutdown.send(true);
        if let Err(err) = handle.task.await {
            if !err.is_cancelled() {
                tracing::warn!(error = %err, "Connection driver ended abnormally");
            }
        }
    }

    /// Queue a command for delivery on the open connection
    ///
    /// Rejects synchronously when the channel is not connected. Commands are
    /// never buffered across reconnects; callers decide what to do with a
    /// rejected command.
    pub fn send(&self, command: OutboundCommand) -> Result<(), CommandRejected> {
        let state = self.inner.status.borrow().state;
        if state != ConnectionState::Connected {
            return Err(CommandRejected::NotConnected { state });
        }
        let slot = self
            .inner
            .outbound
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(sender) => sender
                .send(command)
                .map_err(|_| CommandRejected::ChannelClosed),
            None => Err(CommandRejected::ChannelClosed),
        }
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        // Last handle gone: the driver would otherwise reconnect forever
        if let Some(handle) = self.driver.get_mut().take() {
            let _ = handle.shutdown.send(true);
        }
    }
}

// =============================================================================
// Driver task
// =============================================================================

struct Driver {
    config: RealtimeConfig,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<EventDispatcher>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    outbound: Arc<RwLock<Option<mpsc::UnboundedSender<OutboundCommand>>>>,
}

/// Why one connection's serve loop ended
enum EpochEnd {
    Shutdown,
    Loss(String),
}

impl Driver {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut policy = ReconnectPolicy::new(self.config.backoff_base, self.config.backoff_cap);
        let mut heartbeat = HeartbeatMonitor::new(self.config.heartbeat_interval);
        let url = self.config.channel_url();
        let mut last_error: Option<String> = None;

        loop {
            self.publish(
                ConnectionState::Connecting,
                policy.attempt(),
                last_error.clone(),
            );
            tracing::debug!(
                identity = %self.config.identity,
                attempt = policy.attempt(),
                "Dialing realtime channel"
            );

            let dialed = tokio::select! {
                biased;
                _ = shutdown_signalled(&mut shutdown) => break,
                dialed = tokio::time::timeout(
                    self.config.connect_timeout,
                    self.transport.connect(&url),
                ) => dialed.unwrap_or(Err(TransportError::Timeout)),
            };

            let failure = match dialed {
                Ok(pair) => {
                    policy.reset();
                    last_error = None;
                    match self.serve(pair, &mut heartbeat, &mut shutdown).await {
                        EpochEnd::Shutdown => break,
                        EpochEnd::Loss(reason) => reason,
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        attempt = policy.attempt(),
                        "Realtime connect failed"
                    );
                    err.to_string()
                }
            };

            last_error = Some(failure);
            let delay = policy.next_delay();
            // Reflect the failure right away; the backoff wait must not
            // leave a stale Connected visible to send()
            self.publish(
                ConnectionState::Disconnected,
                policy.attempt(),
                last_error.clone(),
            );
            if let Some(max) = self.config.max_reconnect_attempts {
                if policy.attempt() >= max {
                    tracing::error!(
                        attempts = policy.attempt(),
                        "Reconnect attempts exhausted, giving up"
                    );
                    break;
                }
            }

            tracing::debug!(delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
            tokio::select! {
                biased;
                _ = shutdown_signalled(&mut shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.publish(ConnectionState::Disconnected, policy.attempt(), last_error);
        tracing::info!(identity = %self.config.identity, "Realtime channel stopped");
    }

    /// Serve one open connection until it drops or shutdown is requested
    async fn serve(
        &self,
        pair: TransportPair,
        heartbeat: &mut HeartbeatMonitor,
        shutdown: &mut watch::Receiver<bool>,
    ) -> EpochEnd {
        let TransportPair {
            mut sink,
            mut stream,
        } = pair;
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

        // Install the queue before announcing Connected so a send racing the
        // announcement cannot observe a missing queue.
        self.set_outbound(Some(outbound_tx.clone()));
        heartbeat.start(outbound_tx);
        self.publish(ConnectionState::Connected, 0, None);
        tracing::info!(identity = %self.config.identity, "Realtime channel connected");
        self.dispatcher
            .dispatch(&InboundEvent::Connected(SessionInfo::default()));

        let liveness = self.config.liveness_timeout;
        let mut last_frame_at = tokio::time::Instant::now();

        let end = loop {
            let idle_deadline = liveness.map(|limit| last_frame_at + limit);
            tokio::select! {
                biased;
                _ = shutdown_signalled(shutdown) => break EpochEnd::Shutdown,
                _ = idle_expired(idle_deadline) => {
                    tracing::warn!("No traffic within liveness window, recycling connection");
                    break EpochEnd::Loss("liveness window expired".to_string());
                }
                command = outbound_rx.recv() => {
                    // The queue has live handles in this scope, recv cannot
                    // yield None here
                    let Some(command) = command else {
                        break EpochEnd::Loss("outbound queue closed".to_string());
                    };
                    match events::encode_command(&command) {
                        Ok(frame) => {
                            if let Err(err) = sink.send(frame).await {
                                tracing::warn!(error = %err, "Frame write failed");
                                break EpochEnd::Loss(err.to_string());
                            }
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "Dropping unencodable command");
                        }
                    }
                }
                frame = stream.recv() => {
                    match frame {
                        Some(Ok(raw)) => {
                            last_frame_at = tokio::time::Instant::now();
                            let event = events::decode_frame(&raw);
                            self.dispatcher.dispatch(&event);
                        }
                        Some(Err(err)) => {
                            tracing::warn!(error = %err, "Realtime connection lost");
                            break EpochEnd::Loss(err.to_string());
                        }
                        None => {
                            tracing::info!("Realtime connection closed by server");
                            break EpochEnd::Loss("closed by server".to_string());
                        }
                    }
                }
            }
        };

        heartbeat.stop();
        self.set_outbound(None);
        if matches!(end, EpochEnd::Shutdown) {
            sink.close().await;
        }
        end
    }

    fn set_outbound(&self, sender: Option<mpsc::UnboundedSender<OutboundCommand>>) {
        let mut slot = self
            .outbound
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = sender;
    }

    fn publish(&self, state: ConnectionState, attempt: u32, last_error: Option<String>) {
        self.status.send_replace(ConnectionStatus {
            state,
            attempt,
            last_error,
        });
    }
}

/// Resolve once shutdown has been requested
///
/// A dropped sender counts as shutdown so an orphaned driver cannot spin
/// forever.
async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Sleep until the liveness deadline, or forever when liveness is off
async fn idle_expired(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
