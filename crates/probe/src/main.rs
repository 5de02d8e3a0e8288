//! Interactive console probe for the TutorLink realtime channel
//!
//! Connects as one identity, prints everything the server pushes, and turns
//! console input into outbound commands. Useful for poking at a dev server
//! without building a full client.
//!
//! Usage:
//!   TUTORLINK_WS_URL=ws://localhost:8080 TUTORLINK_IDENTITY=student-1 \
//!       cargo run --bin tutorlink-probe
//!
//! Environment:
//!   TUTORLINK_WS_URL     WebSocket endpoint base (required)
//!   TUTORLINK_IDENTITY   identity to connect as (required)
//!   TUTORLINK_TOKEN      auth token, appended to the dial URL (optional)
//!   TUTORLINK_CHANNEL    conversation to join on startup (optional)
//!   TUTORLINK_STORE_URL  message store base URL for the unread check (optional)
//!
//! Console commands:
//!   /join <conversation>   switch to a conversation and subscribe to it
//!   /leave                 unsubscribe from the current conversation
//!   /typing                flash a typing indicator
//!   /read <message>        advance the read position to a message
//!   /quit                  close the channel and exit
//!   anything else          sent as a text message to the current conversation

use std::env;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use tutorlink_realtime::{
    ConnectionManager, ConnectionState, InboundEvent, InboundEventKind, OutboundCommand,
    RealtimeConfig, TypingDebounce,
};
use tutorlink_shared::{ConversationId, UserId};
use tutorlink_store::StoreClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let ws_url = required_env("TUTORLINK_WS_URL")?;
    let identity = required_env("TUTORLINK_IDENTITY")?;
    let token = env::var("TUTORLINK_TOKEN").ok();

    let mut config = RealtimeConfig::new(identity.clone(), ws_url)
        .with_liveness_timeout(Duration::from_secs(90));
    if let Some(token) = token.clone() {
        config = config.with_auth_token(token);
    }

    if let Ok(store_url) = env::var("TUTORLINK_STORE_URL") {
        report_unread(&store_url, token.as_deref(), &identity).await;
    }

    let manager = ConnectionManager::new(config);
    for kind in InboundEventKind::ALL {
        manager.subscribe(kind, log_event);
    }
    watch_status(&manager);

    info!(identity = %identity, "Opening realtime channel");
    manager.connect().await;
    wait_for_session(&manager).await;

    let mut current = env::var("TUTORLINK_CHANNEL")
        .ok()
        .map(ConversationId::from);
    if let Some(channel) = current.clone() {
        dispatch(&manager, OutboundCommand::JoinChannel { channel_id: channel });
    }

    let mut debounce = TypingDebounce::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read console input")? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if !handle_line(&manager, &mut current, &mut debounce, line) {
                    break;
                }
            }
        }
    }

    manager.disconnect().await;
    info!("Channel closed");
    Ok(())
}

fn required_env(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{} is not set", name))
}

/// One console line; returns false when the probe should exit
fn handle_line(
    manager: &ConnectionManager,
    current: &mut Option<ConversationId>,
    debounce: &mut TypingDebounce,
    line: &str,
) -> bool {
    let mut parts = line.splitn(2, ' ');
    let head = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default().trim();

    match head {
        "/quit" => return false,
        "/join" => {
            if rest.is_empty() {
                warn!("Usage: /join <conversation>");
                return true;
            }
            let channel = ConversationId::from(rest);
            dispatch(
                manager,
                OutboundCommand::JoinChannel {
                    channel_id: channel.clone(),
                },
            );
            *current = Some(channel);
        }
        "/leave" => match current.take() {
            Some(channel) => {
                dispatch(manager, OutboundCommand::LeaveChannel { channel_id: channel });
            }
            None => warn!("No conversation selected"),
        },
        "/typing" => match current.clone() {
            None => warn!("No conversation selected; /join one first"),
            Some(channel) => {
                if debounce.announce() {
                    dispatch(
                        manager,
                        OutboundCommand::Typing {
                            channel_id: channel,
                            is_typing: true,
                        },
                    );
                } else {
                    debug!("Typing indicator suppressed by debounce");
                }
            }
        },
        "/read" => match current.clone() {
            None => warn!("No conversation selected; /join one first"),
            Some(_) if rest.is_empty() => warn!("Usage: /read <message>"),
            Some(channel) => dispatch(
                manager,
                OutboundCommand::ReadReceipt {
                    channel_id: channel,
                    message_id: rest.into(),
                },
            ),
        },
        _ if head.starts_with('/') => warn!(command = %head, "Unknown command"),
        _ => match current.clone() {
            Some(channel) => {
                dispatch(manager, OutboundCommand::text_message(channel, line));
                debounce.clear();
            }
            None => warn!("No conversation selected; /join one first"),
        },
    }
    true
}

fn dispatch(manager: &ConnectionManager, command: OutboundCommand) {
    if let Err(err) = manager.send(command) {
        warn!(error = %err, "Command rejected");
    }
}

fn log_event(event: &InboundEvent) {
    match event {
        InboundEvent::Connected(info) => {
            info!(session = ?info.session_id, "Channel established");
        }
        InboundEvent::Message(msg) => {
            info!(from = %msg.sender_id, conversation = %msg.conversation_id, "{}", msg.content);
        }
        InboundEvent::Typing(ev) => {
            info!(user = %ev.user_id, conversation = %ev.channel_id, is_typing = ev.is_typing, "Typing");
        }
        InboundEvent::Presence(ev) => {
            info!(user = %ev.user_id, is_online = ev.is_online, "Presence");
        }
        InboundEvent::ReadReceipt(ev) => {
            info!(user = %ev.user_id, message = %ev.message_id, "Read receipt");
        }
        InboundEvent::MessageUpdated(msg) => {
            info!(id = %msg.id, "Message edited");
        }
        InboundEvent::MessageDeleted(ev) => {
            info!(id = %ev.message_id, "Message deleted");
        }
        InboundEvent::Ack(ev) => {
            debug!(message = ?ev.message_id, client_ref = ?ev.client_ref, "Ack");
        }
        InboundEvent::Error(detail) => {
            warn!(message = %detail.message, code = ?detail.code, "Server error");
        }
    }
}

/// Block until the channel is up, so an initial join is not rejected
///
/// `connect()` only spawns the driver. Bounded: a dead server should still
/// drop the user at the prompt eventually.
async fn wait_for_session(manager: &ConnectionManager) {
    let mut status_rx = manager.watch_status();
    let wait = tokio::time::timeout(Duration::from_secs(15), async {
        loop {
            if status_rx.borrow_and_update().state == ConnectionState::Connected {
                return;
            }
            if status_rx.changed().await.is_err() {
                return;
            }
        }
    });
    if wait.await.is_err() {
        warn!("Channel not up yet; commands will be rejected until it is");
    }
}

/// Log every lifecycle transition until the manager goes away
fn watch_status(manager: &ConnectionManager) {
    let mut status_rx = manager.watch_status();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            match &status.last_error {
                Some(error) => warn!(
                    state = %status.state,
                    attempt = status.attempt,
                    error = %error,
                    "Connection status"
                ),
                None => info!(state = %status.state, attempt = status.attempt, "Connection status"),
            }
        }
    });
}

async fn report_unread(store_url: &str, token: Option<&str>, identity: &str) {
    let mut store = StoreClient::new(store_url);
    if let Some(token) = token {
        store = store.with_auth_token(token);
    }
    match store.unread_count(&UserId::from(identity)).await {
        Ok(unread) => info!(total = unread.total, "Unread messages"),
        Err(err) => warn!(error = %err, "Could not fetch unread count"),
    }
}
