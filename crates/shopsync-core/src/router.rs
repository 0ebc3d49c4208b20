//! Event Router
//!
//! Per-connection registry mapping an [`EventKind`] to the handlers interested
//! in it. The connection task calls [`EventRouter::dispatch_frame`] once per
//! inbound frame, in arrival order; every handler for that frame is invoked
//! synchronously before the next frame is looked at. Handlers that need async
//! follow-up work must spawn it themselves.
//!
//! Bad input never escapes the router: frames that fail to decode are logged
//! and counted, and a panicking handler is caught so the remaining handlers and
//! later events are still delivered.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, warn};

use crate::event::{EventKind, SyncEvent};

/// Callback invoked for each matching event
pub type Handler = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Identity of a registered handler, returned by [`EventRouter::on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Registration {
    id: HandlerId,
    active: AtomicBool,
    handler: Handler,
}

/// Dispatch table from event kind to ordered handlers
pub struct EventRouter {
    label: String,
    table: Mutex<HashMap<EventKind, Vec<Arc<Registration>>>>,
    next_id: AtomicU64,
    dispatched: AtomicU64,
    dropped: AtomicU64,
}

impl EventRouter {
    /// Create an empty router; `label` names the owning channel in logs
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            table: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            dispatched: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register `handler` for `kind`
    ///
    /// Handlers for the same kind run in registration order. The handler only
    /// sees events dispatched after this call returns.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Arc::new(Registration {
            id,
            active: AtomicBool::new(true),
            handler: Arc::new(handler),
        });
        self.lock().entry(kind).or_default().push(registration);
        debug!(channel = %self.label, event = %kind, handler = id.0, "Handler registered");
        id
    }

    /// Remove exactly the handler `id` registered for `kind`
    ///
    /// Returns whether a handler was removed.
    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        let mut table = self.lock();
        let Some(handlers) = table.get_mut(&kind) else {
            return false;
        };
        let Some(pos) = handlers.iter().position(|r| r.id == id) else {
            return false;
        };
        let removed = handlers.remove(pos);
        removed.active.store(false, Ordering::SeqCst);
        if handlers.is_empty() {
            table.remove(&kind);
        }
        true
    }

    /// Remove every handler for every kind
    pub fn off_all(&self) {
        let mut table = self.lock();
        for registration in table.values().flatten() {
            registration.active.store(false, Ordering::SeqCst);
        }
        table.clear();
        debug!(channel = %self.label, "All handlers removed");
    }

    /// Number of handlers registered for `kind`
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Decode a raw frame and dispatch it
    ///
    /// Unknown or malformed frames are dropped with a diagnostic.
    /// Returns the number of handlers invoked.
    pub fn dispatch_frame(&self, name: &str, payload: serde_json::Value) -> usize {
        match SyncEvent::decode(name, payload) {
            Ok(event) => self.dispatch(&event),
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                if matches!(e, crate::Error::UnknownEvent(_)) {
                    debug!(channel = %self.label, event = name, "Ignoring unknown event");
                } else {
                    warn!(channel = %self.label, event = name, error = %e, "Dropping malformed event");
                }
                0
            }
        }
    }

    /// Invoke every handler registered for the event's kind
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &SyncEvent) -> usize {
        let kind = event.kind();
        // Snapshot so handlers may call on/off without deadlocking.
        let handlers: Vec<Arc<Registration>> = self.lock().get(&kind).cloned().unwrap_or_default();
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        let mut invoked = 0;
        for registration in handlers {
            // Removed by an earlier handler during this dispatch.
            if !registration.active.load(Ordering::SeqCst) {
                continue;
            }
            invoked += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| (registration.handler)(event)));
            if outcome.is_err() {
                error!(
                    channel = %self.label,
                    event = %kind,
                    handler = registration.id.0,
                    "Event handler panicked"
                );
            }
        }
        invoked
    }

    /// Events dispatched so far
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Frames dropped as unknown or malformed
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<Arc<Registration>>>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("label", &self.label)
            .field("dispatched", &self.dispatched())
            .field("dropped", &self.dropped())
            .finish_non_exhaustive()
    }
}
