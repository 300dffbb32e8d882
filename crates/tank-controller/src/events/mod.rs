//! Events module for the tank controller
//!
//! Translation between bus events and the state machine's inputs and effects.

pub mod incoming;
pub mod outgoing;

pub use incoming::{to_input, RejectedEvent};
pub use outgoing::to_event;
