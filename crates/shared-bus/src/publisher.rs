//! # Event Publisher
//!
//! The in-memory bus: a topic-keyed handler registry plus synchronous fan-out.
//!
//! `publish` snapshots the handlers for the topic (and the wildcard) under a
//! read lock, releases the lock, then delivers in registration order. Handlers
//! may therefore subscribe or unsubscribe from inside a delivery.

use crate::events::{Event, Payload, Topic};
use crate::subscriber::{Handler, HandlerError, HandlerKind, Subscription, SubscriptionId};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Trait for publishing events to the bus.
///
/// Publishing never blocks on a handler and never fails; the return value is
/// the number of handlers the event was dispatched to.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &Topic, payload: Payload) -> usize;

    /// Total number of publish calls.
    fn events_published(&self) -> u64;
}

/// Subscriber table shared by the bus and its subscriptions.
#[derive(Default)]
pub(crate) struct Registry {
    handlers: RwLock<HashMap<Topic, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn insert(&self, topic: Topic, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(topic)
            .or_default()
            .push((id, handler));
        id
    }

    pub(crate) fn remove(&self, topic: &Topic, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(topic);
        }
        removed
    }

    /// Handlers for `topic` plus wildcard handlers, in registration order.
    fn snapshot(&self, topic: &Topic) -> Vec<(SubscriptionId, Handler)> {
        let handlers = self.handlers.read();
        let mut matched: Vec<(SubscriptionId, Handler)> = handlers
            .get(topic)
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        if !topic.is_wildcard() {
            if let Some(wildcard) = handlers.get(&Topic::WILDCARD) {
                matched.extend(wildcard.iter().cloned());
                matched.sort_by_key(|(id, _)| *id);
            }
        }
        matched
    }

    fn count(&self, topic: &Topic) -> usize {
        self.handlers.read().get(topic).map_or(0, Vec::len)
    }
}

#[derive(Debug, Default)]
struct Counters {
    events_published: AtomicU64,
    deliveries: AtomicU64,
    handler_failures: AtomicU64,
}

/// Point-in-time copy of the bus counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BusStats {
    pub events_published: u64,
    pub deliveries: u64,
    pub handler_failures: u64,
}

/// In-memory implementation of the event bus.
///
/// One instance is constructed at process start and passed to every
/// component. Task handlers are spawned on the publisher's runtime, or on the
/// runtime captured at construction when the publisher runs on a plain OS
/// thread.
pub struct InMemoryEventBus {
    registry: Arc<Registry>,
    counters: Arc<Counters>,
    runtime: Option<Handle>,
}

impl InMemoryEventBus {
    /// Create a bus, capturing the current tokio runtime if there is one.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            counters: Arc::new(Counters::default()),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Create a bus that spawns task handlers on `runtime` when published to
    /// from outside a runtime.
    #[must_use]
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
            ..Self::new()
        }
    }

    /// Register `handler` for `topic` (or [`Topic::WILDCARD`]).
    pub fn subscribe(&self, topic: &Topic, handler: Handler) -> SubscriptionId {
        let kind = handler.kind_name();
        let id = self.registry.insert(topic.clone(), handler);
        debug!(topic = %topic, subscription = %id, kind, "Handler subscribed");
        id
    }

    /// Remove a registration. Unknown ids are ignored.
    pub fn unsubscribe(&self, topic: &Topic, id: SubscriptionId) -> bool {
        let removed = self.registry.remove(topic, id);
        if removed {
            debug!(topic = %topic, subscription = %id, "Handler unsubscribed");
        }
        removed
    }

    /// Open a queue that receives every event on `topics`.
    #[must_use]
    pub fn subscribe_channel(&self, topics: &[Topic]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let registrations = topics
            .iter()
            .map(|topic| {
                let id = self.subscribe(topic, Handler::channel(tx.clone()));
                (topic.clone(), id)
            })
            .collect();
        Subscription::new(rx, registrations, Arc::clone(&self.registry))
    }

    /// Number of handlers registered directly on `topic`.
    #[must_use]
    pub fn handler_count(&self, topic: &Topic) -> usize {
        self.registry.count(topic)
    }

    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            events_published: self.counters.events_published.load(Ordering::Relaxed),
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
            handler_failures: self.counters.handler_failures.load(Ordering::Relaxed),
        }
    }

    fn deliver(&self, handler: &Handler, event: &Event) -> Result<(), HandlerError> {
        match &handler.kind {
            HandlerKind::Inline(f) => panic::catch_unwind(AssertUnwindSafe(|| f(event)))
                .unwrap_or_else(|panic| Err(HandlerError::Panicked(describe_panic(panic.as_ref())))),
            HandlerKind::Task(f) => {
                let runtime = Handle::try_current()
                    .ok()
                    .or_else(|| self.runtime.clone())
                    .ok_or(HandlerError::NoRuntime)?;
                let future = f(event.clone());
                let counters = Arc::clone(&self.counters);
                let topic = event.topic.clone();
                runtime.spawn(async move {
                    if let Err(e) = future.await {
                        counters.handler_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(topic = %topic, error = %e, "Task handler failed");
                    }
                });
                Ok(())
            }
            HandlerKind::Channel(tx) => tx.send(event.clone()).map_err(|_| HandlerError::Closed),
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, topic: &Topic, payload: Payload) -> usize {
        let event = Event::new(topic.clone(), payload);
        self.counters.events_published.fetch_add(1, Ordering::Relaxed);

        let handlers = self.registry.snapshot(topic);
        if handlers.is_empty() {
            debug!(topic = %topic, kind = event.payload.kind(), "Event published with no subscribers");
            return 0;
        }

        for (id, handler) in &handlers {
            match self.deliver(handler, &event) {
                Ok(()) => {
                    self.counters.deliveries.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.counters.handler_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        topic = %topic,
                        subscription = %id,
                        handler = handler.kind_name(),
                        error = %e,
                        "Handler failed"
                    );
                }
            }
        }

        debug!(
            topic = %topic,
            kind = event.payload.kind(),
            receivers = handlers.len(),
            "Event published"
        );
        handlers.len()
    }

    fn events_published(&self) -> u64 {
        self.counters.events_published.load(Ordering::Relaxed)
    }
}

fn describe_panic(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
