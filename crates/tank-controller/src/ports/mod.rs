//! Ports for the tank controller

pub mod inbound;

pub use inbound::{ControllerHandle, StatusQuery};
