// ── Typed event bus ──
//
// Registrations are keyed by event kind; each pairs a filter predicate
// with a handler. Publishing runs every matching handler synchronously on
// the publisher's task, so handlers must only hand the event off.

mod filter;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::model::{LockEvent, LockEventKind};

pub use filter::EventFilter;

/// Handler half of a bus registration.
pub type EventHandler = Arc<dyn Fn(Arc<LockEvent>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

struct Registration {
    id: RegistrationId,
    filter: EventFilter,
    handler: EventHandler,
}

/// Process-wide fan-out point between the event sources (push stream,
/// poller) and the per-lock engines.
pub struct EventBus {
    registrations: DashMap<LockEventKind, Vec<Arc<Registration>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registrations: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn register<F>(&self, kind: LockEventKind, filter: EventFilter, handler: F) -> RegistrationId
    where
        F: Fn(Arc<LockEvent>) + Send + Sync + 'static,
    {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations
            .entry(kind)
            .or_default()
            .push(Arc::new(Registration {
                id,
                filter,
                handler: Arc::new(handler),
            }));
        id
    }

    /// Returns `true` if a registration was removed.
    pub fn unregister(&self, id: RegistrationId) -> bool {
        let mut removed = false;
        for mut entry in self.registrations.iter_mut() {
            let before = entry.len();
            entry.retain(|r| r.id != id);
            removed |= entry.len() != before;
        }
        removed
    }

    /// Dispatch an event to every registration for its kind whose filter
    /// accepts it. Returns the number of handlers invoked.
    pub fn publish(&self, event: LockEvent) -> usize {
        let event = Arc::new(event);

        // Collect first so handlers may register/unregister without
        // re-entering a held shard lock.
        let matching: Vec<EventHandler> = self
            .registrations
            .get(&event.kind)
            .map(|regs| {
                regs.iter()
                    .filter(|r| r.filter.matches(&event))
                    .map(|r| Arc::clone(&r.handler))
                    .collect()
            })
            .unwrap_or_default();

        if matching.is_empty() {
            tracing::debug!(kind = ?event.kind, serial = ?event.sensor_serial, "event matched no handler");
        }

        for handler in &matching {
            handler(Arc::clone(&event));
        }
        matching.len()
    }

    pub fn handler_count(&self, kind: LockEventKind) -> usize {
        self.registrations.get(&kind).map_or(0, |regs| regs.len())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
