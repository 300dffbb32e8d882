//! # Service Trait - Uniform Lifecycle for Long-Running Components
//!
//! Every adapter and the tank controller implement [`Service`]. The trait only
//! describes the *body* of a service; scheduling, cancellation and state
//! tracking belong to [`crate::ServiceRunner`].
//!
//! ## Lifecycle
//!
//! ```text
//!          start()              stop()
//!   IDLE ──────────► RUNNING ──────────► STOPPING ──► IDLE
//!                       │                              ▲
//!                       └──── run() failed ────────────┘
//! ```
//!
//! `setup()` runs once before `run()`, `cleanup()` runs once after it on every
//! exit path: normal return, failure and cancellation.
//!
//! ## Example Implementation
//!
//! ```rust,ignore
//! use shared_types::{Service, ServiceResult};
//! use async_trait::async_trait;
//!
//! pub struct Heartbeat { period: Duration }
//!
//! #[async_trait]
//! impl Service for Heartbeat {
//!     fn name(&self) -> &'static str { "heartbeat" }
//!     async fn run(&mut self) -> ServiceResult<()> {
//!         loop {
//!             tokio::time::sleep(self.period).await;
//!             tracing::info!("tick");
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type for service operations.
#[derive(Debug, Clone, Error)]
#[error("[{service}] {kind}: {message}")]
pub struct ServiceError {
    /// The service that encountered the error.
    pub service: &'static str,
    /// Error kind.
    pub kind: ServiceErrorKind,
    /// Human-readable error message.
    pub message: String,
}

impl ServiceError {
    pub fn new(service: &'static str, kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            service,
            kind,
            message: message.into(),
        }
    }

    pub fn setup(service: &'static str, message: impl Into<String>) -> Self {
        Self::new(service, ServiceErrorKind::SetupFailed, message)
    }

    pub fn runtime(service: &'static str, message: impl Into<String>) -> Self {
        Self::new(service, ServiceErrorKind::RuntimeError, message)
    }
}

/// Result alias for lifecycle operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Categories of service errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceErrorKind {
    /// `setup()` failed; `run()` was never entered.
    SetupFailed,
    /// `run()` returned an error.
    RuntimeError,
    /// The service task panicked and its state was lost.
    Panicked,
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetupFailed => write!(f, "SetupFailed"),
            Self::RuntimeError => write!(f, "RuntimeError"),
            Self::Panicked => write!(f, "Panicked"),
        }
    }
}

/// Lifecycle state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    /// Not scheduled.
    #[default]
    Idle,
    /// `setup()`/`run()` task is live.
    Running,
    /// Cancellation requested, waiting for the task to unwind.
    Stopping,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
            Self::Stopping => write!(f, "STOPPING"),
        }
    }
}

/// The body of a long-running component.
///
/// `run()` is cancelled by dropping its future at the next suspension point,
/// so every `.await` inside it is a cancellation point. Anything that must be
/// released on the way out goes into `cleanup()`.
#[async_trait]
pub trait Service: Send + 'static {
    /// Short identifier used in logs and the registry.
    fn name(&self) -> &'static str;

    /// Runs once before `run()`.
    async fn setup(&mut self) -> ServiceResult<()> {
        Ok(())
    }

    /// The long-lived loop.
    async fn run(&mut self) -> ServiceResult<()>;

    /// Runs once after `run()` exits, whatever the reason.
    async fn cleanup(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::runtime("hardware", "serial port vanished");
        assert_eq!(
            err.to_string(),
            "[hardware] RuntimeError: serial port vanished"
        );
    }

    #[test]
    fn test_service_state_default_is_idle() {
        assert_eq!(ServiceState::default(), ServiceState::Idle);
        assert_eq!(ServiceState::Stopping.to_string(), "STOPPING");
    }
}
