//! # Adapters
//!
//! Each adapter connects one external world to the event bus and implements
//! [`shared_types::Service`]. None of them touch the controller directly.
//!
//! ```text
//!  serial node ─── HardwareAdapter ──┐
//!  MQTT broker ─── CloudAdapter ─────┼──→ EventBus ←──→ TankController
//!  browser ─────── DashboardAdapter ─┘
//! ```
//!
//! Inbound data is validated here; the core only ever sees well-formed
//! payloads.

pub mod cloud;
pub mod dashboard;
pub mod hardware;

pub use cloud::CloudAdapter;
pub use dashboard::DashboardAdapter;
pub use hardware::{HardwareAdapter, Link};

use shared_types::ValidationError;
use thiserror::Error;

/// Adapter errors: transport failures and rejected frames.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("rejected value: {0}")]
    Invalid(#[from] ValidationError),

    #[error("connection closed by peer")]
    Closed,

    #[error("MQTT client error: {0}")]
    Mqtt(String),
}

impl AdapterError {
    /// Short label for the rejects metric.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Malformed(_) => "malformed",
            Self::Invalid(_) => "invalid",
            Self::Closed => "closed",
            Self::Mqtt(_) => "mqtt",
        }
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;
