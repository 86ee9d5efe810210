//! Event Bus - in-order synchronous delivery
//!
//! The listener list is snapshotted before delivery, so a listener may
//! subscribe or unsubscribe (itself or others) from inside `on_event`
//! without deadlocking. Changes take effect from the next `publish`.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

// ============================================================================
// EventListener Trait
// ============================================================================

/// Listener ID, returned by `subscribe` and accepted by `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Event listener
///
/// Called synchronously; slow work here delays every listener registered
/// after this one.
pub trait EventListener<E>: Send + Sync {
    /// Listener name (for logs)
    fn name(&self) -> &str;

    /// Handle one event
    fn on_event(&self, event: &E);
}

/// Adapter for closure listeners
struct FnListener<F> {
    name: String,
    handler: F,
}

impl<E, F> EventListener<E> for FnListener<F>
where
    F: Fn(&E) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &E) {
        (self.handler)(event)
    }
}

// ============================================================================
// EventBus
// ============================================================================

type Registered<E> = (ListenerId, Arc<dyn EventListener<E>>);

/// Typed event bus
pub struct EventBus<E> {
    /// Listeners in subscription order
    listeners: RwLock<Vec<Registered<E>>>,

    /// Listener ID counter
    listener_counter: AtomicU64,

    /// Published event count
    event_count: AtomicU64,
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            listener_counter: AtomicU64::new(0),
            event_count: AtomicU64::new(0),
        }
    }

    /// Register a listener
    pub fn subscribe(&self, listener: Arc<dyn EventListener<E>>) -> ListenerId {
        let id = ListenerId::new(self.listener_counter.fetch_add(1, Ordering::SeqCst));

        debug!(
            listener_name = listener.name(),
            listener_id = %id,
            "Registering event listener"
        );

        self.listeners.write().push((id, listener));
        id
    }

    /// Register a closure as a listener
    pub fn subscribe_fn<F>(&self, name: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
        E: 'static,
    {
        self.subscribe(Arc::new(FnListener {
            name: name.into(),
            handler,
        }))
    }

    /// Remove a listener, `false` if it was not registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = listeners.len() != before;

        if removed {
            debug!(listener_id = %id, "Unregistered event listener");
        }

        removed
    }

    /// Deliver an event to every listener, in subscription order
    pub fn publish(&self, event: &E) {
        self.event_count.fetch_add(1, Ordering::SeqCst);

        let snapshot: Vec<Registered<E>> = self.listeners.read().clone();

        for (id, listener) in snapshot {
            trace!(
                listener_id = %id,
                listener_name = listener.name(),
                "Delivering event to listener"
            );
            listener.on_event(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Total events published
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::SeqCst)
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
