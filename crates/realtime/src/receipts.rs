//! Read receipt bookkeeping
//!
//! Receipts can arrive out of order, duplicated across reconnects, or not at
//! all. The tracker keeps the record with the highest read timestamp per
//! participant and conversation, so read progress never moves backwards.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tutorlink_shared::{ConversationId, MessageId, UserId};

use crate::events::ReadReceiptEvent;

type Records = HashMap<ConversationId, HashMap<UserId, ReceiptRecord>>;

/// Latest read position of one participant in one conversation
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptRecord {
    pub message_id: MessageId,
    pub read_at: i64,
}

/// Last-write-wins store of read receipts
#[derive(Default)]
pub struct ReadReceiptTracker {
    records: RwLock<Records>,
}

impl ReadReceiptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one receipt in; returns whether it advanced the stored record
    ///
    /// Ordered by `read_at` alone. A receipt that arrives late with an older
    /// timestamp loses, and re-delivery of the current record changes
    /// nothing.
    pub fn apply(&self, event: &ReadReceiptEvent) -> bool {
        let mut records = self.write_records();
        let per_user = records.entry(event.channel_id.clone()).or_default();
        match per_user.get(&event.user_id) {
            Some(existing) if event.read_at <= existing.read_at => false,
            _ => {
                per_user.insert(
                    event.user_id.clone(),
                    ReceiptRecord {
                        message_id: event.message_id.clone(),
                        read_at: event.read_at,
                    },
                );
                true
            }
        }
    }

    /// Latest read position of `user` in `channel`, if any was ever reported
    pub fn last_read(&self, channel: &ConversationId, user: &UserId) -> Option<ReceiptRecord> {
        self.read_records()
            .get(channel)
            .and_then(|per_user| per_user.get(user))
            .cloned()
    }

    /// Every participant's read position in `channel`
    pub fn receipts_in(&self, channel: &ConversationId) -> Vec<(UserId, ReceiptRecord)> {
        self.read_records()
            .get(channel)
            .map(|per_user| {
                per_user
                    .iter()
                    .map(|(user, record)| (user.clone(), record.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn read_records(&self) -> RwLockReadGuard<'_, Records> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_records(&self) -> RwLockWriteGuard<'_, Records> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(channel: &str, user: &str, message: &str, read_at: i64) -> ReadReceiptEvent {
        ReadReceiptEvent {
            user_id: user.into(),
            channel_id: channel.into(),
            message_id: message.into(),
            read_at,
        }
    }

    #[test]
    fn test_newer_receipt_advances_the_record() {
        let tracker = ReadReceiptTracker::new();
        assert!(tracker.apply(&receipt("conv-1", "tutor-1", "m1", 100)));
        assert!(tracker.apply(&receipt("conv-1", "tutor-1", "m2", 150)));

        let record = tracker
            .last_read(&"conv-1".into(), &"tutor-1".into())
            .unwrap();
        assert_eq!(record.message_id.as_str(), "m2");
        assert_eq!(record.read_at, 150);
    }

    #[test]
    fn test_stale_receipt_arriving_late_is_ignored() {
        let tracker = ReadReceiptTracker::new();
        assert!(tracker.apply(&receipt("conv-1", "tutor-1", "m2", 100)));
        assert!(!tracker.apply(&receipt("conv-1", "tutor-1", "m1", 50)));

        let record = tracker
            .last_read(&"conv-1".into(), &"tutor-1".into())
            .unwrap();
        assert_eq!(record.message_id.as_str(), "m2");
        assert_eq!(record.read_at, 100);
    }

    #[test]
    fn test_equal_timestamp_keeps_the_existing_record() {
        let tracker = ReadReceiptTracker::new();
        assert!(tracker.apply(&receipt("conv-1", "tutor-1", "m2", 100)));
        assert!(!tracker.apply(&receipt("conv-1", "tutor-1", "m9", 100)));

        let record = tracker
            .last_read(&"conv-1".into(), &"tutor-1".into())
            .unwrap();
        assert_eq!(record.message_id.as_str(), "m2");
    }

    #[test]
    fn test_participants_are_tracked_independently() {
        let tracker = ReadReceiptTracker::new();
        tracker.apply(&receipt("conv-1", "tutor-1", "m3", 300));
        tracker.apply(&receipt("conv-1", "student-2", "m1", 100));

        let tutor = tracker
            .last_read(&"conv-1".into(), &"tutor-1".into())
            .unwrap();
        let student = tracker
            .last_read(&"conv-1".into(), &"student-2".into())
            .unwrap();
        assert_eq!(tutor.message_id.as_str(), "m3");
        assert_eq!(student.message_id.as_str(), "m1");
        assert_eq!(tracker.receipts_in(&"conv-1".into()).len(), 2);
    }

    #[test]
    fn test_unknown_participant_has_no_record() {
        let tracker = ReadReceiptTracker::new();
        assert!(tracker
            .last_read(&"conv-1".into(), &"nobody".into())
            .is_none());
        assert!(tracker.receipts_in(&"conv-9".into()).is_empty());
    }
}
