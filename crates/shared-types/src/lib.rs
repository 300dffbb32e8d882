//! # Shared Types Crate
//!
//! Domain entities and the service lifecycle contract shared by the event
//! bus, the tank controller and every transport adapter.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: readings, valve openings and states are
//!   defined once here and travel unchanged across the bus.
//! - **Validated at construction**: `ValveOpening` and `Thresholds` cannot hold
//!   values outside their documented ranges.
//! - **Uniform lifecycle**: adapters and the controller all implement
//!   [`Service`] and are driven by a [`ServiceRunner`].

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod entities;
pub mod errors;
pub mod service_registry;
pub mod service_runner;
pub mod service_trait;

pub use entities::*;
pub use errors::*;
pub use service_registry::ServiceRegistry;
pub use service_runner::{Lifecycle, ServiceRunner};
pub use service_trait::{Service, ServiceError, ServiceErrorKind, ServiceResult, ServiceState};
