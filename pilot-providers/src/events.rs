//! Explicit subscriptions for provider events.
//!
//! Handlers run synchronously on the task that emits the event. A [`Subscription`] unsubscribes
//! its handler when dropped.

use ethers_core::types::{Address, TransactionRequest, H256};
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

/// Discriminant of a [`ProviderEvent`], used to pick which events a handler receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    AccountsChanged,
    ChainChanged,
    Disconnect,
    BeforeSend,
    Sent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The accounts exposed to the caller changed
    AccountsChanged(Vec<Address>),
    /// The upstream switched chains
    ChainChanged(u64),
    /// The upstream went away
    Disconnect,
    /// A checkpoint was taken on the fork and `call` is about to be sent
    BeforeSend { checkpoint: String, call: TransactionRequest },
    /// The call sent after `checkpoint` was accepted by the fork
    Sent { checkpoint: String, hash: H256 },
}

impl ProviderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ProviderEvent::AccountsChanged(_) => EventKind::AccountsChanged,
            ProviderEvent::ChainChanged(_) => EventKind::ChainChanged,
            ProviderEvent::Disconnect => EventKind::Disconnect,
            ProviderEvent::BeforeSend { .. } => EventKind::BeforeSend,
            ProviderEvent::Sent { .. } => EventKind::Sent,
        }
    }
}

type Handler = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, EventKind, Handler)>,
}

/// Dispatches [`ProviderEvent`]s to subscribed handlers. Clones share the same handlers.
#[derive(Clone, Default)]
pub struct EventHub {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub").field("handlers", &self.len()).finish()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events of `kind`.
    #[must_use = "the handler is removed when the subscription is dropped"]
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ProviderEvent) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.push((id, kind, Arc::new(handler)));
        Subscription { id, registry: Arc::downgrade(&self.registry) }
    }

    /// Calls every handler subscribed to the event's kind, in subscription order.
    pub fn emit(&self, event: &ProviderEvent) {
        let kind = event.kind();
        // handlers may subscribe or unsubscribe, so they are called without holding the lock
        let handlers: Vec<Handler> = self
            .lock()
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    /// Number of live subscriptions
    pub fn len(&self) -> usize {
        self.lock().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        lock(&self.registry)
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

/// Handle returned by [`EventHub::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Removes the handler. Same as dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).handlers.retain(|(id, _, _)| *id != self.id);
        }
    }
}
