//! Domain module for the tank controller
//!
//! ## Core Modules
//! - system: Top-level `(state, input)` transition table
//! - ladder: Automatic sub-state hysteresis ladder
//! - history: Bounded level-reading window
//! - machine: The combined state machine, driven by explicit time

pub mod history;
pub mod ladder;
pub mod machine;
pub mod system;

pub use history::LevelHistory;
pub use ladder::next_sub_state;
pub use machine::{Effect, TankStateMachine};
pub use system::{decide, ControllerInput, Decision};
