//! # Event Subscriber
//!
//! Handler kinds and the channel-backed [`Subscription`].
//!
//! A handler is one of:
//!
//! - **inline**: a synchronous closure run on the publisher's thread. Keep it
//!   short; panics are caught and counted as failures.
//! - **task**: an async closure; each delivery is spawned as its own tokio task.
//! - **channel**: a non-blocking send into an unbounded queue. This is how an
//!   event is marshaled onto another component's execution context (the
//!   controller drains its queue from its own loop).

use crate::events::{Event, Topic};
use crate::publisher::Registry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Errors raised by a handler invocation. Logged by the bus, never propagated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler reported a failure.
    #[error("handler failed: {0}")]
    Failed(String),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The receiving side of a channel handler was dropped.
    #[error("handler queue closed")]
    Closed,

    /// A task handler was published to from outside any tokio runtime.
    #[error("no runtime available to spawn handler")]
    NoRuntime,
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Identifies one registration. Returned by `subscribe`, consumed by `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Future returned by task handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

type InlineFn = dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync;
type TaskFn = dyn Fn(Event) -> HandlerFuture + Send + Sync;

/// A subscriber callback.
#[derive(Clone)]
pub struct Handler {
    pub(crate) kind: HandlerKind,
}

#[derive(Clone)]
pub(crate) enum HandlerKind {
    Inline(Arc<InlineFn>),
    Task(Arc<TaskFn>),
    Channel(mpsc::UnboundedSender<Event>),
}

impl Handler {
    /// Synchronous handler, run on the publisher's thread.
    pub fn inline<F>(f: F) -> Self
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self {
            kind: HandlerKind::Inline(Arc::new(f)),
        }
    }

    /// Asynchronous handler, spawned once per delivery.
    pub fn task<F, Fut>(f: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self {
            kind: HandlerKind::Task(Arc::new(move |event: Event| -> HandlerFuture {
                Box::pin(f(event))
            })),
        }
    }

    /// Queue handler: every delivery is pushed onto `tx` without blocking.
    pub fn channel(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            kind: HandlerKind::Channel(tx),
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self.kind {
            HandlerKind::Inline(_) => "inline",
            HandlerKind::Task(_) => "task",
            HandlerKind::Channel(_) => "channel",
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("kind", &self.kind_name()).finish()
    }
}

/// A queue of events for a set of topics.
///
/// When dropped, every registration it owns is removed from the bus.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Event>,
    registrations: Vec<(Topic, SubscriptionId)>,
    registry: Arc<Registry>,
}

impl Subscription {
    pub(crate) fn new(
        receiver: mpsc::UnboundedReceiver<Event>,
        registrations: Vec<(Topic, SubscriptionId)>,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            receiver,
            registrations,
            registry,
        }
    }

    /// Receive the next event.
    ///
    /// Returns `None` only if the queue is closed, which cannot happen while
    /// the subscription itself is alive and registered.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    /// Topics this subscription listens on.
    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.registrations.iter().map(|(topic, _)| topic)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for (topic, id) in self.registrations.drain(..) {
            self.registry.remove(&topic, id);
        }
        debug!("Subscription dropped, registrations removed");
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("registrations", &self.registrations)
            .finish()
    }
}
