//! # Service Container
//!
//! Configuration and construction of every long-running component.

pub mod config;
pub mod services;

pub use config::{load_config, ConfigError, ControlUnitConfig};
pub use services::{ContainerError, ServiceContainer};
