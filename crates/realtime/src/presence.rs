//! Presence bookkeeping with a freshness window
//!
//! The server's `is_online` flag starts going stale the moment it is
//! delivered, so recency of activity keeps counting: a participant seen
//! within the freshness window is shown online even after their flag
//! flipped. Going offline needs no eager signal on teardown; the server
//! marks presence when the socket closes.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tutorlink_shared::{clock, UserId};

use crate::events::PresenceEvent;

/// One participant's presence as last reported
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceRecord {
    pub is_online: bool,
    /// Unix epoch milliseconds of the last known activity
    pub last_seen_at: Option<i64>,
}

/// Tracks reported presence and answers "shown online?" queries
pub struct PresenceTracker {
    freshness: Duration,
    records: RwLock<HashMap<UserId, PresenceRecord>>,
}

impl PresenceTracker {
    pub fn new(freshness: Duration) -> Self {
        Self {
            freshness,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Fold one presence event into the tracked state
    ///
    /// Merges per user: an event without `last_seen_at` keeps the previously
    /// known activity time.
    pub fn apply(&self, event: &PresenceEvent) {
        let mut records = self.write_records();
        let record = records
            .entry(event.user_id.clone())
            .or_insert(PresenceRecord {
                is_online: false,
                last_seen_at: None,
            });
        record.is_online = event.is_online;
        if event.last_seen_at.is_some() {
            record.last_seen_at = event.last_seen_at;
        }
    }

    /// Record activity for `user` at the current wall clock
    pub fn touch(&self, user: &UserId) {
        let mut records = self.write_records();
        let record = records.entry(user.clone()).or_insert(PresenceRecord {
            is_online: false,
            last_seen_at: None,
        });
        record.last_seen_at = Some(clock::now_unix_ms());
    }

    /// Presence verdict at the current wall clock
    pub fn is_online(&self, user: &UserId) -> bool {
        self.is_online_at(user, clock::now_unix_ms())
    }

    /// Presence verdict at `now_ms`
    ///
    /// Online while the reported flag is set or the last activity is fresher
    /// than the freshness window. Unknown participants are offline.
    pub fn is_online_at(&self, user: &UserId, now_ms: i64) -> bool {
        let records = self.read_records();
        let Some(record) = records.get(user) else {
            return false;
        };
        if record.is_online {
            return true;
        }
        let freshness_ms = self.freshness.as_millis() as i64;
        match record.last_seen_at {
            Some(last_seen) => now_ms.saturating_sub(last_seen) < freshness_ms,
            None => false,
        }
    }

    /// Raw record for `user`, if one was ever reported
    pub fn record_for(&self, user: &UserId) -> Option<PresenceRecord> {
        self.read_records().get(user).cloned()
    }

    fn read_records(&self) -> RwLockReadGuard<'_, HashMap<UserId, PresenceRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_records(&self) -> RwLockWriteGuard<'_, HashMap<UserId, PresenceRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}
