// ── Registry event bus ──
//
// Typed synchronous publish/subscribe. Handlers run on the publishing
// thread, in subscription order. A handler that panics is logged and
// skipped; delivery continues with the next one.

use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::warn;

use crate::model::Device;

/// Events carried by an [`EventBus`] are keyed by a kind.
pub trait BusEvent: Send + Sync + 'static {
    type Kind: Copy + Eq + Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

// ── Registry events ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    DeviceChanged,
    DevicesReplaced,
}

#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// One device changed; carries its new state.
    DeviceChanged(Arc<Device>),
    /// The device set was replaced; carries the full new list.
    DevicesReplaced(Arc<Vec<Arc<Device>>>),
}

impl BusEvent for RegistryEvent {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            Self::DeviceChanged(_) => EventKind::DeviceChanged,
            Self::DevicesReplaced(_) => EventKind::DevicesReplaced,
        }
    }
}

// ── EventBus ─────────────────────────────────────────────────────

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Listener<E: BusEvent> {
    id: u64,
    kind: E::Kind,
    handler: Handler<E>,
}

struct BusInner<E: BusEvent> {
    listeners: Mutex<Vec<Listener<E>>>,
    next_id: AtomicU64,
}

impl<E: BusEvent> BusInner<E> {
    fn remove(&self, id: u64) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|l| l.id != id);
    }
}

/// An owned publish/subscribe hub. Cloning shares the listener set.
pub struct EventBus<E: BusEvent> {
    inner: Arc<BusInner<E>>,
}

impl<E: BusEvent> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register `handler` for events of `kind`. Dropping the returned
    /// handle unsubscribes.
    pub fn subscribe(
        &self,
        kind: E::Kind,
        handler: impl Fn(&E) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Listener {
                id,
                kind,
                handler: Arc::new(handler),
            });

        let bus: Weak<BusInner<E>> = Arc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(bus) = bus.upgrade() {
                    bus.remove(id);
                }
            })),
        }
    }

    /// Deliver `event` to every listener of its kind. Returns how many
    /// handlers completed without panicking.
    pub fn publish(&self, event: &E) -> usize {
        let kind = event.kind();
        // Snapshot so handlers may subscribe or unsubscribe while running.
        let handlers: Vec<Handler<E>> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| Arc::clone(&l.handler))
            .collect();

        let mut delivered = 0;
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_ok() {
                delivered += 1;
            } else {
                warn!(?kind, "event subscriber panicked; continuing delivery");
            }
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Unsubscribe handle returned by [`EventBus::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
