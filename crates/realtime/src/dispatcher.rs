//! Inbound event dispatch
//!
//! Handlers register per event kind and receive events in wire arrival order.
//! Dispatch runs on the connection driver task, one event at a time, so
//! ordering needs no further coordination here.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::events::{InboundEvent, InboundEventKind};

/// Callback invoked for each matching event
pub type EventHandler = Arc<dyn Fn(&InboundEvent) + Send + Sync + 'static>;

/// Token returned by `subscribe`; pass it back to `unsubscribe` to detach
/// exactly that registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    kind: InboundEventKind,
    id: u64,
}

impl SubscriptionHandle {
    pub fn kind(&self) -> InboundEventKind {
        self.kind
    }
}

struct HandlerEntry {
    id: u64,
    handler: EventHandler,
}

/// Per-kind handler registry
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Mutex<HashMap<InboundEventKind, Vec<HandlerEntry>>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_handlers(&self) -> MutexGuard<'_, HashMap<InboundEventKind, Vec<HandlerEntry>>> {
        // Handler panics are contained in dispatch; a poisoned lock still
        // holds a valid registry
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a handler for one event kind
    ///
    /// Handlers for the same kind run in registration order. The handler
    /// stays registered until the returned handle is passed to
    /// `unsubscribe`; dropping the handle alone detaches nothing.
    pub fn subscribe(
        &self,
        kind: InboundEventKind,
        handler: impl Fn(&InboundEvent) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_handlers().entry(kind).or_default().push(HandlerEntry {
            id,
            handler: Arc::new(handler),
        });
        SubscriptionHandle { kind, id }
    }

    /// Detach a registration; unknown or already-detached handles are a no-op
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let mut handlers = self.lock_handlers();
        if let Some(entries) = handlers.get_mut(&handle.kind) {
            entries.retain(|entry| entry.id != handle.id);
            if entries.is_empty() {
                handlers.remove(&handle.kind);
            }
        }
    }

    /// Invoke every handler registered for this event's kind
    ///
    /// The handler list is snapshotted first, so handlers may subscribe or
    /// unsubscribe reentrantly. A panicking handler is logged and skipped;
    /// the rest of the list still runs.
    pub fn dispatch(&self, event: &InboundEvent) {
        let kind = event.kind();
        let snapshot: Vec<(u64, EventHandler)> = {
            let handlers = self.lock_handlers();
            match handlers.get(&kind) {
                Some(entries) => entries
                    .iter()
                    .map(|entry| (entry.id, Arc::clone(&entry.handler)))
                    .collect(),
                None => return,
            }
        };

        for (id, handler) in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
                tracing::error!(
                    kind = %kind,
                    handler_id = id,
                    panic = %panic_detail(&panic),
                    "Event handler panicked"
                );
            }
        }
    }

    /// Number of live registrations for a kind
    pub fn handler_count(&self, kind: InboundEventKind) -> usize {
        self.lock_handlers().get(&kind).map_or(0, Vec::len)
    }
}

fn panic_detail(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
