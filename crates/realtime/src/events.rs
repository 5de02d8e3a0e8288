//! Wire protocol events and serialization
//!
//! Every frame is a JSON object `{"type": <discriminator>, "data": <payload>}`.
//! Inbound and outbound traffic are separate closed enums; there is no
//! string-keyed dispatch anywhere above this module.

use serde::{Deserialize, Serialize};
use tutorlink_shared::{AttachmentMeta, ConversationId, Message, MessageId, MessageKind, UserId};

use crate::error::ProtocolError;

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events received from the server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Connection acknowledged; also synthesized locally when the transport opens
    #[serde(rename = "connection")]
    Connected(SessionInfo),

    /// New message delivered to one of our conversations
    Message(Message),

    /// A participant started or stopped typing
    Typing(TypingEvent),

    /// A participant's presence changed
    Presence(PresenceEvent),

    /// A participant read up to a message
    ReadReceipt(ReadReceiptEvent),

    /// A message was edited; payload is the full updated message
    MessageUpdated(Message),

    /// A message was deleted
    MessageDeleted(MessageDeletedEvent),

    /// Server acknowledged one of our commands
    Ack(AckEvent),

    /// Server-reported error; also synthesized for unparseable frames
    Error(ErrorDetail),
}

impl InboundEvent {
    pub fn kind(&self) -> InboundEventKind {
        match self {
            Self::Connected(_) => InboundEventKind::Connected,
            Self::Message(_) => InboundEventKind::Message,
            Self::Typing(_) => InboundEventKind::Typing,
            Self::Presence(_) => InboundEventKind::Presence,
            Self::ReadReceipt(_) => InboundEventKind::ReadReceipt,
            Self::MessageUpdated(_) => InboundEventKind::MessageUpdated,
            Self::MessageDeleted(_) => InboundEventKind::MessageDeleted,
            Self::Ack(_) => InboundEventKind::Ack,
            Self::Error(_) => InboundEventKind::Error,
        }
    }
}

/// Discriminator-only mirror of `InboundEvent`, used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundEventKind {
    Connected,
    Message,
    Typing,
    Presence,
    ReadReceipt,
    MessageUpdated,
    MessageDeleted,
    Ack,
    Error,
}

impl InboundEventKind {
    /// Every kind, in wire order; handy for subscribe-to-everything consumers
    pub const ALL: [InboundEventKind; 9] = [
        Self::Connected,
        Self::Message,
        Self::Typing,
        Self::Presence,
        Self::ReadReceipt,
        Self::MessageUpdated,
        Self::MessageDeleted,
        Self::Ack,
        Self::Error,
    ];
}

impl std::fmt::Display for InboundEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connection"),
            Self::Message => write!(f, "message"),
            Self::Typing => write!(f, "typing"),
            Self::Presence => write!(f, "presence"),
            Self::ReadReceipt => write!(f, "read_receipt"),
            Self::MessageUpdated => write!(f, "message_updated"),
            Self::MessageDeleted => write!(f, "message_deleted"),
            Self::Ack => write!(f, "ack"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Event Data Structures
// =============================================================================

/// Session details from the server's connection acknowledgement
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Typing indicator change
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypingEvent {
    pub user_id: UserId,
    pub channel_id: ConversationId,
    pub is_typing: bool,
}

/// Presence change; `last_seen_at` is epoch milliseconds
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PresenceEvent {
    pub user_id: UserId,
    pub is_online: bool,
    #[serde(default)]
    pub last_seen_at: Option<i64>,
}

/// Read-position advance; `read_at` is epoch milliseconds
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadReceiptEvent {
    pub user_id: UserId,
    pub channel_id: ConversationId,
    pub message_id: MessageId,
    #[serde(default)]
    pub read_at: i64,
}

/// Message deletion notice
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageDeletedEvent {
    pub message_id: MessageId,
    #[serde(default)]
    pub channel_id: Option<ConversationId>,
}

/// Command acknowledgement
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AckEvent {
    #[serde(default)]
    pub message_id: Option<MessageId>,
    #[serde(default)]
    pub client_ref: Option<String>,
}

/// Error payload; synthesized locally for frames we cannot parse
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

// =============================================================================
// Client-to-Server Commands
// =============================================================================

/// Commands sent to the server
///
/// Each maps 1:1 onto a single frame. This layer never buffers or retries
/// commands; rejection happens synchronously in `ConnectionManager::send`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundCommand {
    /// Send a message to a conversation
    NewMessage {
        channel_id: ConversationId,
        content: String,
        kind: MessageKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_to: Option<MessageId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        attachment: Option<AttachmentMeta>,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_ref: Option<String>,
    },

    /// Announce or retract a typing indicator
    Typing {
        channel_id: ConversationId,
        is_typing: bool,
    },

    /// Advance our read position in a conversation
    ReadReceipt {
        channel_id: ConversationId,
        message_id: MessageId,
    },

    /// Start receiving a conversation's traffic
    JoinChannel { channel_id: ConversationId },

    /// Stop receiving a conversation's traffic
    LeaveChannel { channel_id: ConversationId },

    /// React to a message
    MessageReaction {
        channel_id: ConversationId,
        message_id: MessageId,
        emoji: String,
    },

    /// Application-level heartbeat
    Ping,
}

impl OutboundCommand {
    /// Plain text message with no attachment or reply threading
    pub fn text_message(channel_id: ConversationId, content: impl Into<String>) -> Self {
        Self::NewMessage {
            channel_id,
            content: content.into(),
            kind: MessageKind::Text,
            reply_to: None,
            attachment: None,
            client_ref: None,
        }
    }
}

// =============================================================================
// Frame Codec
// =============================================================================

/// Decode one inbound frame
///
/// Total over all inputs: an unknown discriminator, a payload that fails to
/// deserialize, or non-JSON input yields an `Error` event rather than a
/// decode failure, so a misbehaving server never tears the connection down.
pub fn decode_frame(raw: &str) -> InboundEvent {
    match serde_json::from_str::<InboundEvent>(raw) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, "Unparseable inbound frame");
            InboundEvent::Error(ErrorDetail {
                message: format!("unparseable frame: {}", err),
                code: None,
            })
        }
    }
}

/// Encode one outbound command into its frame
pub fn encode_command(command: &OutboundCommand) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(command)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_frame_decodes_with_minimal_payload() {
        let event = decode_frame(r#"{"type":"message","data":{"id":"m1","content":"hi"}}"#);
        match event {
            InboundEvent::Message(msg) => {
                assert_eq!(msg.id.as_str(), "m1");
                assert_eq!(msg.content, "hi");
            }
            other => panic!("Expected Message event, got {:?}", other),
        }
    }

    #[test]
    fn test_typing_frame_decodes() {
        let raw = r#"{"type":"typing","data":{"user_id":"tutor-3","channel_id":"conv-1","is_typing":true}}"#;
        match decode_frame(raw) {
            InboundEvent::Typing(ev) => {
                assert_eq!(ev.user_id.as_str(), "tutor-3");
                assert!(ev.is_typing);
            }
            other => panic!("Expected Typing event, got {:?}", other),
        }
    }

    #[test]
    fn test_presence_frame_decodes() {
        let raw =
            r#"{"type":"presence","data":{"user_id":"u1","is_online":false,"last_seen_at":1700000000000}}"#;
        match decode_frame(raw) {
            InboundEvent::Presence(ev) => {
                assert!(!ev.is_online);
                assert_eq!(ev.last_seen_at, Some(1_700_000_000_000));
            }
            other => panic!("Expected Presence event, got {:?}", other),
        }
    }

    #[test]
    fn test_read_receipt_frame_decodes() {
        let raw = r#"{"type":"read_receipt","data":{"user_id":"u1","channel_id":"c1","message_id":"m9","read_at":100}}"#;
        match decode_frame(raw) {
            InboundEvent::ReadReceipt(ev) => {
                assert_eq!(ev.message_id.as_str(), "m9");
                assert_eq!(ev.read_at, 100);
            }
            other => panic!("Expected ReadReceipt event, got {:?}", other),
        }
    }

    #[test]
    fn test_message_updated_frame_decodes() {
        let raw = r#"{"type":"message_updated","data":{"id":"m7","content":"hi (edited)","edited":true,"edited_at":1700000000900}}"#;
        match decode_frame(raw) {
            InboundEvent::MessageUpdated(msg) => {
                assert_eq!(msg.id.as_str(), "m7");
                assert_eq!(msg.content, "hi (edited)");
                assert!(msg.edited);
                assert_eq!(msg.edited_at, Some(1_700_000_000_900));
            }
            other => panic!("Expected MessageUpdated event, got {:?}", other),
        }
    }

    #[test]
    fn test_connection_frame_decodes() {
        let raw = r#"{"type":"connection","data":{"session_id":"sess-1","user_id":"student-1"}}"#;
        match decode_frame(raw) {
            InboundEvent::Connected(info) => {
                assert_eq!(info.session_id.as_deref(), Some("sess-1"));
            }
            other => panic!("Expected Connected event, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_discriminator_becomes_error_event() {
        let event = decode_frame(r#"{"type":"reaction_added","data":{"emoji":"+1"}}"#);
        match event {
            InboundEvent::Error(detail) => {
                assert!(detail.message.contains("unparseable frame"));
                assert!(detail.code.is_none());
            }
            other => panic!("Expected Error event, got {:?}", other),
        }
    }

    #[test]
    fn test_non_json_input_becomes_error_event() {
        assert_eq!(decode_frame("not json at all").kind(), InboundEventKind::Error);
        assert_eq!(decode_frame("").kind(), InboundEventKind::Error);
    }

    #[test]
    fn test_bad_payload_becomes_error_event() {
        // Valid discriminator, payload missing required fields
        let event = decode_frame(r#"{"type":"typing","data":{"user_id":"u1"}}"#);
        assert_eq!(event.kind(), InboundEventKind::Error);
    }

    #[test]
    fn test_server_error_frame_decodes() {
        let raw = r#"{"type":"error","data":{"message":"rate limited","code":"429"}}"#;
        match decode_frame(raw) {
            InboundEvent::Error(detail) => {
                assert_eq!(detail.message, "rate limited");
                assert_eq!(detail.code.as_deref(), Some("429"));
            }
            other => panic!("Expected Error event, got {:?}", other),
        }
    }

    #[test]
    fn test_ping_serialization() {
        let json = encode_command(&OutboundCommand::Ping).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_new_message_serialization() {
        let cmd = OutboundCommand::text_message(ConversationId::from("conv-1"), "hello");
        let json = encode_command(&cmd).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "new_message");
        assert_eq!(value["data"]["channel_id"], "conv-1");
        assert_eq!(value["data"]["content"], "hello");
        assert_eq!(value["data"]["kind"], "text");
        // Unset optionals stay off the wire
        assert!(value["data"].get("reply_to").is_none());
        assert!(value["data"].get("client_ref").is_none());
    }

    #[test]
    fn test_join_channel_serialization() {
        let cmd = OutboundCommand::JoinChannel {
            channel_id: ConversationId::from("conv-7"),
        };
        let value: serde_json::Value =
            serde_json::from_str(&encode_command(&cmd).unwrap()).unwrap();
        assert_eq!(value["type"], "join_channel");
        assert_eq!(value["data"]["channel_id"], "conv-7");
    }

    #[test]
    fn test_typing_command_serialization() {
        let cmd = OutboundCommand::Typing {
            channel_id: ConversationId::from("conv-1"),
            is_typing: false,
        };
        let value: serde_json::Value =
            serde_json::from_str(&encode_command(&cmd).unwrap()).unwrap();
        assert_eq!(value["type"], "typing");
        assert_eq!(value["data"]["is_typing"], false);
    }

    #[test]
    fn test_kind_display_matches_wire_names() {
        assert_eq!(InboundEventKind::Connected.to_string(), "connection");
        assert_eq!(InboundEventKind::ReadReceipt.to_string(), "read_receipt");
        assert_eq!(InboundEventKind::MessageUpdated.to_string(), "message_updated");
    }

    #[test]
    fn test_kind_covers_every_variant() {
        let raws = [
            r#"{"type":"message","data":{"id":"m1","content":"x"}}"#,
            r#"{"type":"message_deleted","data":{"message_id":"m1"}}"#,
            r#"{"type":"ack","data":{}}"#,
        ];
        let kinds: Vec<InboundEventKind> = raws.iter().map(|r| decode_frame(r).kind()).collect();
        assert_eq!(
            kinds,
            vec![
                InboundEventKind::Message,
                InboundEventKind::MessageDeleted,
                InboundEventKind::Ack
            ]
        );
    }
}
