//! Typing indicator state
//!
//! Typing signals are soft state: a participant that stops typing without
//! ever sending the paired `false` event must still fade out. Entries
//! therefore carry a deadline and expire lazily on read.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::time::Instant;
use tutorlink_shared::{ConversationId, UserId};

use crate::events::TypingEvent;

const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(3);

type Deadlines = HashMap<ConversationId, HashMap<UserId, Instant>>;

/// Tracks who is typing in which conversation
///
/// Methods take `&self`; the tracker is safe to share behind an `Arc` and
/// drive straight from an event handler.
pub struct TypingTracker {
    ttl: Duration,
    entries: RwLock<Deadlines>,
}

impl TypingTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fold one typing event into the tracked state
    pub fn apply(&self, event: &TypingEvent) {
        let mut entries = self.write_entries();
        if event.is_typing {
            entries
                .entry(event.channel_id.clone())
                .or_default()
                .insert(event.user_id.clone(), Instant::now() + self.ttl);
        } else if let Some(channel) = entries.get_mut(&event.channel_id) {
            channel.remove(&event.user_id);
            if channel.is_empty() {
                entries.remove(&event.channel_id);
            }
        }
    }

    /// Whether `user` is typing in `channel` right now
    pub fn is_typing(&self, channel: &ConversationId, user: &UserId) -> bool {
        let now = Instant::now();
        self.read_entries()
            .get(channel)
            .and_then(|users| users.get(user))
            .is_some_and(|deadline| now <= *deadline)
    }

    /// Everyone currently typing in `channel`
    pub fn typing_users(&self, channel: &ConversationId) -> Vec<UserId> {
        let now = Instant::now();
        self.read_entries()
            .get(channel)
            .map(|users| {
                users
                    .iter()
                    .filter(|(_, deadline)| now <= **deadline)
                    .map(|(user, _)| user.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sweep out entries past their deadline; returns how many were removed
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write_entries();
        let before: usize = entries.values().map(HashMap::len).sum();
        for users in entries.values_mut() {
            users.retain(|_, deadline| now <= *deadline);
        }
        entries.retain(|_, users| !users.is_empty());
        before - entries.values().map(HashMap::len).sum::<usize>()
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, Deadlines> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, Deadlines> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Collapses repeated keystrokes into one typing announcement per window
///
/// Lives on the sending side, usually one per open conversation view. The
/// caller sends `Typing { is_typing: true }` exactly when [`announce`]
/// returns true.
///
/// [`announce`]: TypingDebounce::announce
#[derive(Debug)]
pub struct TypingDebounce {
    window: Duration,
    last_announced: Option<Instant>,
}

impl TypingDebounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_announced: None,
        }
    }

    /// Whether a typing announcement should go out now
    pub fn announce(&mut self) -> bool {
        let now = Instant::now();
        match self.last_announced {
            Some(last) if now < last + self.window => false,
            _ => {
                self.last_announced = Some(now);
                true
            }
        }
    }

    /// Forget the window, typically after sending a message or on blur
    ///
    /// The next keystroke announces immediately again.
    pub fn clear(&mut self) {
        self.last_announced = None;
    }
}

impl Default for TypingDebounce {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}
