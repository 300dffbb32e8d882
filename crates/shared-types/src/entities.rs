//! # Core Domain Entities
//!
//! Readings, valve positions and operating states exchanged between the
//! controller and the adapters.

use crate::errors::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One sensor sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelReading {
    /// Water level as reported by the sensor node.
    pub water_level: f64,
    /// Wall-clock time the sample was taken (or received, if the node sent none).
    pub timestamp: DateTime<Utc>,
}

impl LevelReading {
    pub fn new(water_level: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            water_level,
            timestamp,
        }
    }

    /// Reading stamped with the current wall-clock time.
    pub fn now(water_level: f64) -> Self {
        Self::new(water_level, Utc::now())
    }

    /// Validate a raw level coming off a transport.
    ///
    /// Levels must be finite and non-negative; anything else is a malformed
    /// payload and never reaches the controller.
    pub fn validated(water_level: f64, timestamp: DateTime<Utc>) -> Result<Self, ValidationError> {
        if !water_level.is_finite() {
            return Err(ValidationError::NotFinite { field: "level" });
        }
        if water_level < 0.0 {
            return Err(ValidationError::NegativeLevel(water_level));
        }
        Ok(Self::new(water_level, timestamp))
    }
}

/// Commanded actuator position, always within `[0, 100]` percent.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ValveOpening(f64);

impl ValveOpening {
    pub const CLOSED: Self = Self(0.0);
    pub const HALF: Self = Self(50.0);
    pub const FULL: Self = Self(100.0);

    /// Clamp an arbitrary percentage into range. NaN maps to closed.
    pub fn clamped(percent: f64) -> Self {
        if percent.is_nan() {
            return Self::CLOSED;
        }
        Self(percent.clamp(0.0, 100.0))
    }

    /// Strict constructor used at adapter boundaries.
    pub fn try_new(percent: f64) -> Result<Self, ValidationError> {
        if !percent.is_finite() {
            return Err(ValidationError::NotFinite { field: "opening" });
        }
        if !(0.0..=100.0).contains(&percent) {
            return Err(ValidationError::OpeningOutOfRange(percent));
        }
        Ok(Self(percent))
    }

    pub fn percent(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for ValveOpening {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<ValveOpening> for f64 {
    fn from(value: ValveOpening) -> Self {
        value.0
    }
}

impl fmt::Display for ValveOpening {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

/// Top-level operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemState {
    /// No level data stream (initial state, and after a watchdog timeout).
    #[default]
    Unconnected,
    /// The sub-state ladder owns the valve.
    Automatic,
    /// The operator owns the valve.
    Manual,
}

impl SystemState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unconnected => "UNCONNECTED",
            Self::Automatic => "AUTOMATIC",
            Self::Manual => "MANUAL",
        }
    }

    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Unconnected)
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refinement of [`SystemState::Automatic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutomaticSubState {
    #[default]
    Normal,
    TrackingPreAlarm,
    PreAlarm,
    Alarm,
}

impl AutomaticSubState {
    /// Fixed valve opening asserted on entry.
    pub const fn valve_opening(self) -> ValveOpening {
        match self {
            Self::Normal | Self::TrackingPreAlarm => ValveOpening::CLOSED,
            Self::PreAlarm => ValveOpening::HALF,
            Self::Alarm => ValveOpening::FULL,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::TrackingPreAlarm => "TRACKING_PRE_ALARM",
            Self::PreAlarm => "PRE_ALARM",
            Self::Alarm => "ALARM",
        }
    }
}

impl fmt::Display for AutomaticSubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide level and timing thresholds.
///
/// Invariant: `0 <= l1 < l2`, both durations non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    l1: f64,
    l2: f64,
    t1: Duration,
    t2: Duration,
}

impl Thresholds {
    pub fn new(l1: f64, l2: f64, t1: Duration, t2: Duration) -> Result<Self, ValidationError> {
        if !l1.is_finite() || !l2.is_finite() || l1 < 0.0 || l1 >= l2 {
            return Err(ValidationError::InvalidLevels { l1, l2 });
        }
        if t1.is_zero() {
            return Err(ValidationError::ZeroDuration { name: "T1" });
        }
        if t2.is_zero() {
            return Err(ValidationError::ZeroDuration { name: "T2" });
        }
        Ok(Self { l1, l2, t1, t2 })
    }

    /// Lower level threshold.
    pub fn l1(&self) -> f64 {
        self.l1
    }

    /// Upper level threshold.
    pub fn l2(&self) -> f64 {
        self.l2
    }

    /// Minimum dwell in `TRACKING_PRE_ALARM` before escalating.
    pub fn t1(&self) -> Duration {
        self.t1
    }

    /// Connectivity timeout.
    pub fn t2(&self) -> Duration {
        self.t2
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            l1: 0.30,
            l2: 0.50,
            t1: Duration::from_secs(5),
            t2: Duration::from_secs(10),
        }
    }
}

/// Snapshot of the controller, as served to dashboard-facing collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub state: SystemState,
    /// `None` outside `AUTOMATIC`.
    pub sub_state: Option<AutomaticSubState>,
    /// Last known water level.
    pub water_level: Option<f64>,
    /// Last commanded valve opening.
    pub valve_opening: ValveOpening,
    /// Number of retained history entries.
    pub history_len: usize,
    pub last_reading_at: Option<DateTime<Utc>>,
}

impl Default for ControllerStatus {
    fn default() -> Self {
        Self {
            state: SystemState::Unconnected,
            sub_state: None,
            water_level: None,
            valve_opening: ValveOpening::CLOSED,
            history_len: 0,
            last_reading_at: None,
        }
    }
}
