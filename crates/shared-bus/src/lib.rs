//! # Shared Bus - In-Process Event Bus
//!
//! Topic-based publish/subscribe backbone between the hardware, cloud and
//! dashboard adapters and the tank controller. No component holds a
//! reference to another; they agree only on topic names and payload shapes.
//!
//! ```text
//!  hardware ─┐                          ┌─▶ controller queue
//!  cloud ────┼─▶ publish(topic, payload)┼─▶ inline handlers
//!  dashboard ┘          │               └─▶ wildcard taps
//!                       ▼
//!              handlers in registration order
//! ```
//!
//! ## Delivery rules
//!
//! - Handlers for one publish call run in registration order, wildcard
//!   handlers included.
//! - A failing or panicking handler is logged and counted; the remaining
//!   handlers still run and the publisher never sees the error.
//! - Failures never unregister a handler.
//! - No persistence, no delivery guarantees beyond best-effort in-process
//!   fan-out.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{Event, Payload, Topic, TopicMap};
pub use publisher::{BusStats, EventPublisher, InMemoryEventBus};
pub use subscriber::{Handler, HandlerError, HandlerFuture, Subscription, SubscriptionId};
