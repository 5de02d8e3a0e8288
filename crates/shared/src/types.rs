//! Chat domain types shared across TutorLink clients

use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId, UserId};

// =============================================================================
// Enums
// =============================================================================

/// Kind of chat message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
    System,
}

impl Default for MessageKind {
    fn default() -> Self {
        Self::Text
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
            Self::File => write!(f, "file"),
            Self::System => write!(f, "system"),
        }
    }
}

// =============================================================================
// Chat Models
// =============================================================================

/// Attachment metadata carried alongside image/file messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

/// A single chat message
///
/// Only `id` and `content` are required on the wire; the backend omits
/// fields it has no value for, so everything else decodes leniently.
/// Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    #[serde(default)]
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub sender_id: UserId,
    #[serde(default)]
    pub receiver_id: Option<UserId>,
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub attachment: Option<AttachmentMeta>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub read_at: Option<i64>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub edited_at: Option<i64>,
    #[serde(default)]
    pub reply_to: Option<MessageId>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Denormalized glimpse of the other participant in a conversation
///
/// Maintained by the Message Store so list views render without a second
/// lookup; the realtime layer treats it as read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_online: bool,
}

/// A conversation between two or more participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub peer: Option<ParticipantSummary>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_default() {
        assert_eq!(MessageKind::default(), MessageKind::Text);
    }

    #[test]
    fn test_message_kind_display() {
        assert_eq!(format!("{}", MessageKind::Text), "text");
        assert_eq!(format!("{}", MessageKind::System), "system");
    }

    #[test]
    fn test_message_decodes_minimal_payload() {
        // The backend sends only the fields it has; id + content suffice
        let msg: Message = serde_json::from_str(r#"{"id":"m1","content":"hi"}"#).unwrap();
        assert_eq!(msg.id.as_str(), "m1");
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.kind, MessageKind::Text);
        assert!(!msg.read);
        assert!(msg.attachment.is_none());
        assert!(msg.created_at.is_none());
    }

    #[test]
    fn test_message_decodes_full_payload() {
        let raw = r#"{
            "id": "m7",
            "content": "see attached",
            "conversation_id": "conv-1",
            "sender_id": "tutor-3",
            "receiver_id": "student-8",
            "kind": "file",
            "attachment": {"url": "https://cdn.tutorlink.io/f/1", "name": "notes.pdf"},
            "read": true,
            "read_at": 1700000000500,
            "reply_to": "m5",
            "created_at": 1700000000000
        }"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.kind, MessageKind::File);
        assert_eq!(msg.sender_id.as_str(), "tutor-3");
        assert_eq!(msg.attachment.as_ref().unwrap().name, "notes.pdf");
        assert_eq!(msg.read_at, Some(1_700_000_000_500));
        assert_eq!(msg.reply_to.as_ref().unwrap().as_str(), "m5");
    }

    #[test]
    fn test_conversation_decodes_with_defaults() {
        let raw = r#"{"id":"conv-2","participants":["student-1","tutor-2"]}"#;
        let conv: Conversation = serde_json::from_str(raw).unwrap();
        assert_eq!(conv.participants.len(), 2);
        assert!(!conv.archived);
        assert_eq!(conv.unread_count, 0);
        assert!(conv.last_message.is_none());
        assert!(conv.peer.is_none());
    }

    #[test]
    fn test_conversation_carries_peer_summary() {
        let raw = r#"{
            "id": "conv-3",
            "participants": ["student-1", "tutor-2"],
            "peer": {"id": "tutor-2", "name": "Maya K.", "is_online": true}
        }"#;
        let conv: Conversation = serde_json::from_str(raw).unwrap();
        let peer = conv.peer.unwrap();
        assert_eq!(peer.id.as_str(), "tutor-2");
        assert_eq!(peer.name.as_deref(), Some("Maya K."));
        assert!(peer.avatar_url.is_none());
        assert!(peer.is_online);
    }
}
