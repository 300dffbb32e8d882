//! Error types for the tank controller

use shared_types::ServiceError;
use thiserror::Error;

/// Tank controller errors
#[derive(Debug, Error)]
pub enum ControllerError {
    /// History window must hold at least one reading
    #[error("History capacity must be greater than zero")]
    ZeroHistoryCapacity,

    /// Watchdog interval must be non-zero
    #[error("Watchdog interval must be greater than zero")]
    ZeroWatchdogInterval,

    /// `run` called before `setup` subscribed the inbox
    #[error("Controller inbox not subscribed")]
    NotSubscribed,

    /// The bus dropped the inbox sender
    #[error("Controller inbox closed")]
    InboxClosed,
}

pub type ControllerResult<T> = Result<T, ControllerError>;

impl From<ControllerError> for ServiceError {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::NotSubscribed
            | ControllerError::ZeroHistoryCapacity
            | ControllerError::ZeroWatchdogInterval => {
                ServiceError::setup(crate::SERVICE_NAME, err.to_string())
            }
            ControllerError::InboxClosed => ServiceError::runtime(crate::SERVICE_NAME, err.to_string()),
        }
    }
}
