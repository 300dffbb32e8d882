//! # Error Types
//!
//! Validation errors raised when raw transport values are turned into domain
//! entities.

use thiserror::Error;

/// A value failed domain validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// NaN or infinite number.
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    /// Valve opening outside `[0, 100]`.
    #[error("valve opening {0} outside 0..=100")]
    OpeningOutOfRange(f64),

    /// Sensor reported a negative level.
    #[error("negative water level {0}")]
    NegativeLevel(f64),

    /// Level thresholds do not satisfy `0 <= L1 < L2`.
    #[error("invalid level thresholds: L1={l1} must be >= 0 and < L2={l2}")]
    InvalidLevels { l1: f64, l2: f64 },

    /// A timing threshold is zero.
    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },
}
