//! # Controller Metrics
//!
//! Prometheus metrics for the tank state machine.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! tank-controller = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `tank_state_transitions_total` - Counter of system-state entries (by state)
//! - `tank_sub_state_transitions_total` - Counter of automatic sub-state entries (by sub_state)
//! - `tank_system_state` - Gauge of the current system state (0=Unconnected, 1=Automatic, 2=Manual)
//! - `tank_valve_opening_percent` - Gauge of the last commanded valve opening
//! - `tank_water_level` - Gauge of the last reported water level
//! - `tank_readings_processed_total` - Counter of level readings handled
//! - `tank_watchdog_timeouts_total` - Counter of sensor-silence timeouts

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_gauge, register_int_counter, register_int_counter_vec, Gauge, IntCounter,
    IntCounterVec,
};

#[cfg(feature = "metrics")]
use shared_types::{AutomaticSubState, SystemState};

#[cfg(feature = "metrics")]
lazy_static! {
    /// System-state entries, labeled by state
    pub static ref STATE_TRANSITIONS: IntCounterVec = register_int_counter_vec!(
        "tank_state_transitions_total",
        "Total number of system-state entries",
        &["state"]
    )
    .expect("Failed to create STATE_TRANSITIONS metric");

    /// Automatic sub-state entries, labeled by sub-state
    pub static ref SUB_STATE_TRANSITIONS: IntCounterVec = register_int_counter_vec!(
        "tank_sub_state_transitions_total",
        "Total number of automatic sub-state entries",
        &["sub_state"]
    )
    .expect("Failed to create SUB_STATE_TRANSITIONS metric");

    /// Current system state (0=Unconnected, 1=Automatic, 2=Manual)
    pub static ref SYSTEM_STATE: Gauge = register_gauge!(
        "tank_system_state",
        "Current system state (0=Unconnected, 1=Automatic, 2=Manual)"
    )
    .expect("Failed to create SYSTEM_STATE metric");

    /// Last commanded valve opening
    pub static ref VALVE_OPENING: Gauge = register_gauge!(
        "tank_valve_opening_percent",
        "Last commanded valve opening in percent"
    )
    .expect("Failed to create VALVE_OPENING metric");

    /// Last reported water level
    pub static ref WATER_LEVEL: Gauge = register_gauge!(
        "tank_water_level",
        "Last reported water level"
    )
    .expect("Failed to create WATER_LEVEL metric");

    /// Level readings handled
    pub static ref READINGS_PROCESSED: IntCounter = register_int_counter!(
        "tank_readings_processed_total",
        "Total number of level readings processed"
    )
    .expect("Failed to create READINGS_PROCESSED metric");

    /// Sensor-silence timeouts
    pub static ref WATCHDOG_TIMEOUTS: IntCounter = register_int_counter!(
        "tank_watchdog_timeouts_total",
        "Total number of sensor-silence timeouts"
    )
    .expect("Failed to create WATCHDOG_TIMEOUTS metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

#[cfg(feature = "metrics")]
pub fn record_state_transition(state: SystemState) {
    STATE_TRANSITIONS.with_label_values(&[state.as_str()]).inc();
    SYSTEM_STATE.set(match state {
        SystemState::Unconnected => 0.0,
        SystemState::Automatic => 1.0,
        SystemState::Manual => 2.0,
    });
}

#[cfg(feature = "metrics")]
pub fn record_sub_state_transition(sub_state: AutomaticSubState) {
    SUB_STATE_TRANSITIONS
        .with_label_values(&[sub_state.as_str()])
        .inc();
}

#[cfg(feature = "metrics")]
pub fn set_valve_opening(percent: f64) {
    VALVE_OPENING.set(percent);
}

/// Record a processed reading and its level
#[cfg(feature = "metrics")]
pub fn record_reading(level: f64) {
    READINGS_PROCESSED.inc();
    WATER_LEVEL.set(level);
}

#[cfg(feature = "metrics")]
pub fn record_watchdog_timeout() {
    WATCHDOG_TIMEOUTS.inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_state_transition(_state: shared_types::SystemState) {}

#[cfg(not(feature = "metrics"))]
pub fn record_sub_state_transition(_sub_state: shared_types::AutomaticSubState) {}

#[cfg(not(feature = "metrics"))]
pub fn set_valve_opening(_percent: f64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_reading(_level: f64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_watchdog_timeout() {}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{AutomaticSubState, SystemState};

    #[test]
    fn test_metrics_callable_with_or_without_feature() {
        record_state_transition(SystemState::Automatic);
        record_sub_state_transition(AutomaticSubState::Alarm);
        set_valve_opening(100.0);
        record_reading(0.42);
        record_watchdog_timeout();
    }
}
