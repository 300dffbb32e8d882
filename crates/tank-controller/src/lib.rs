//! # tank-controller
//!
//! Timed two-level state machine that keeps a tank from overflowing by
//! driving a drain valve.
//!
//! ## Overview
//!
//! - **System states**: `UNCONNECTED`, `AUTOMATIC`, `MANUAL`
//! - **Automatic ladder**: `NORMAL → TRACKING_PRE_ALARM → PRE_ALARM → ALARM`
//! - **Watchdog**: sensor silence longer than T2 disconnects and closes the valve
//! - **History**: the last readings are republished on every sample
//!
//! ## Architecture
//!
//! ```text
//! sensor.level ─────────┐                        ┌──→ cmd.valve
//! button.pressed ───────┼──→ TankController ─────┼──→ mode
//! manual.valve_command ─┘     (single task)      └──→ levels.history
//! ```
//!
//! The pure core ([`TankStateMachine`]) takes time as an argument and returns
//! effects; [`TankControllerService`] feeds it from the bus and publishes the
//! effects back.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tank_controller::{ControllerConfig, TankControllerService};
//! use shared_types::{Lifecycle, ServiceRunner};
//!
//! let service = TankControllerService::new(ControllerConfig::default(), bus.clone())?;
//! let status = service.handle();
//! let mut runner = ServiceRunner::new(service);
//! runner.start().await?;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod error;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod service;

/// Name used in logs and lifecycle errors.
pub const SERVICE_NAME: &str = "controller";

pub use domain::{
    decide, next_sub_state, ControllerInput, Decision, Effect, LevelHistory, TankStateMachine,
};
pub use error::{ControllerError, ControllerResult};
pub use events::RejectedEvent;
pub use ports::{ControllerHandle, StatusQuery};
pub use service::{ControllerConfig, TankControllerService};
