//! # Wiring
//!
//! Connects the components through the event bus. There are no direct calls
//! between the controller and the adapters; this table is the whole
//! contract.
//!
//! ```text
//! Topic                  Publisher            Subscribers
//! ─────────────────────  ───────────────────  ─────────────────────────
//! sensor.level           cloud, hardware      controller
//! button.pressed         hardware, dashboard  controller
//! manual.valve_command   hardware, dashboard  controller
//! mode                   controller           hardware, cloud
//! cmd.valve              controller           hardware, cloud
//! levels.history         controller           dashboard
//! *                      -                    metrics tap
//! ```

pub mod metrics_tap;

pub use metrics_tap::MetricsTap;
