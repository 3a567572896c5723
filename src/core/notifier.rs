//! Typed publish/subscribe notifier.
//!
//! Events are a tagged union implementing [`Event`]; handlers subscribe to one
//! event kind and receive the whole event by reference. Handlers registered
//! for a kind run in registration order, synchronously, on the publishing
//! thread.
//!
//! Handlers run outside the registry lock, so they may subscribe, unsubscribe
//! or publish from inside a callback. A panicking handler is caught and
//! logged; the remaining handlers for that publish still run.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// An event that can be routed by kind.
pub trait Event: Send + Sync + 'static {
    /// Discriminant handlers subscribe to.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// The kind of this event.
    fn kind(&self) -> Self::Kind;
}

/// Shared handler callback.
pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Identifier of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Registration<E> {
    id: SubscriptionId,
    handler: Handler<E>,
    once: bool,
}

struct Registry<E: Event> {
    next_id: u64,
    handlers: HashMap<E::Kind, Vec<Registration<E>>>,
}

impl<E: Event> Registry<E> {
    fn remove(&mut self, kind: E::Kind, id: SubscriptionId) -> bool {
        let Some(list) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let Some(pos) = list.iter().position(|r| r.id == id) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            self.handlers.remove(&kind);
        }
        true
    }
}

/// Publish/subscribe registry for events of type `E`.
///
/// Cloning an `EventBus` yields another handle to the same registry.
pub struct EventBus<E: Event> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: Event> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        let handlers: usize = registry.handlers.values().map(Vec::len).sum();
        f.debug_struct("EventBus").field("handlers", &handlers).finish()
    }
}

impl<E: Event> EventBus<E> {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                handlers: HashMap::new(),
            })),
        }
    }

    /// Register `handler` for every future event of `kind`.
    pub fn subscribe<F>(&self, kind: E::Kind, handler: F) -> Subscription<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler), false)
    }

    /// Register `handler` for the next event of `kind` only.
    pub fn subscribe_once<F>(&self, kind: E::Kind, handler: F) -> Subscription<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler), true)
    }

    /// Remove a registration. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, kind: E::Kind, id: SubscriptionId) -> bool {
        self.registry.lock().remove(kind, id)
    }

    /// Number of handlers currently registered for `kind`.
    pub fn handler_count(&self, kind: E::Kind) -> usize {
        self.registry.lock().handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to the handlers registered for its kind and return how
    /// many were invoked.
    pub fn publish(&self, event: &E) -> usize {
        let kind = event.kind();
        let handlers: Vec<(SubscriptionId, Handler<E>)> = {
            let mut registry = self.registry.lock();
            let Some(list) = registry.handlers.get_mut(&kind) else {
                return 0;
            };
            let snapshot = list
                .iter()
                .map(|r| (r.id, Arc::clone(&r.handler)))
                .collect();
            // One-shot handlers leave before they run so a re-entrant publish
            // cannot fire them twice.
            list.retain(|r| !r.once);
            if list.is_empty() {
                registry.handlers.remove(&kind);
            }
            snapshot
        };

        for (id, handler) in &handlers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
                tracing::error!(
                    ?kind,
                    subscription = id.0,
                    reason = panic_message(panic.as_ref()),
                    "event handler panicked"
                );
            }
        }
        handlers.len()
    }

    fn register(&self, kind: E::Kind, handler: Handler<E>, once: bool) -> Subscription<E> {
        let mut registry = self.registry.lock();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push(Registration { id, handler, once });
        drop(registry);

        Subscription {
            kind,
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]; the capability to unsubscribe.
///
/// Dropping the handle keeps the handler registered.
pub struct Subscription<E: Event> {
    kind: E::Kind,
    id: SubscriptionId,
    registry: Weak<Mutex<Registry<E>>>,
}

impl<E: Event> Subscription<E> {
    /// Registration id.
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Kind the handler listens to.
    pub const fn kind(&self) -> E::Kind {
        self.kind
    }

    /// Remove the handler. Returns `false` if it already fired (one-shot),
    /// was removed, or the notifier is gone.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.lock().remove(self.kind, self.id))
    }
}

impl<E: Event> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
