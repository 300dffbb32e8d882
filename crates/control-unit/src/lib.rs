//! # Tank Control Unit
//!
//! Process that keeps a tank from overflowing. It joins three external
//! worlds to one controller through an in-process event bus:
//!
//! - a level sensor publishing over MQTT (`adapters::cloud`)
//! - the valve node on a serial link (`adapters::hardware`)
//! - an operator dashboard over HTTP (`adapters::dashboard`)
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and construction of every service
//! - `adapters/` - transport adapters, one `Service` each
//! - `wiring/` - bus topology and the metrics tap
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry
//! 2. Load configuration (defaults, then `TANK_*` variables) and validate it
//! 3. Build the bus, the controller and the enabled adapters
//! 4. Start all services; stop them in reverse order on Ctrl+C

pub mod adapters;
pub mod container;
pub mod wiring;

pub use container::{load_config, ControlUnitConfig, ServiceContainer};
