//! # Bus Events
//!
//! Topics, payload contracts and the event record the bus hands to handlers.
//!
//! Topic names are plain strings; the logical names below are the defaults
//! carried by [`TopicMap`] and can be replaced by configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{LevelReading, SystemState, ValveOpening};
use std::borrow::Cow;
use std::fmt;

/// Named channel identifier. Immutable, compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(Cow<'static, str>);

impl Topic {
    /// Subscriptions on this topic receive every event.
    pub const WILDCARD: Topic = Topic(Cow::Borrowed("*"));

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == "*"
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Topic {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for Topic {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// Logical topic names used by the controller and the adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMap {
    /// in: `{level, timestamp}`
    pub sensor_level: Topic,
    /// in: trigger only
    pub button_pressed: Topic,
    /// in: `{opening}`
    pub manual_valve_command: Topic,
    /// out: `{state}`
    pub mode: Topic,
    /// out: `{opening}`
    pub valve_command: Topic,
    /// out: `{readings}`
    pub levels_history: Topic,
}

impl Default for TopicMap {
    fn default() -> Self {
        Self {
            sensor_level: Topic::from_static("sensor.level"),
            button_pressed: Topic::from_static("button.pressed"),
            manual_valve_command: Topic::from_static("manual.valve_command"),
            mode: Topic::from_static("mode"),
            valve_command: Topic::from_static("cmd.valve"),
            levels_history: Topic::from_static("levels.history"),
        }
    }
}

/// Payload shapes, one per topic contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// A validated sensor sample.
    Level {
        level: f64,
        timestamp: DateTime<Utc>,
    },
    ButtonPressed,
    /// Operator-requested valve opening (already range-checked).
    ManualValve { opening: ValveOpening },
    Mode { state: SystemState },
    ValveCommand { opening: ValveOpening },
    /// Retained history window, oldest first.
    LevelsHistory { readings: Vec<LevelReading> },
    /// Free-form payload for topics outside the control loop.
    Json(serde_json::Value),
}

impl Payload {
    pub fn level(reading: LevelReading) -> Self {
        Self::Level {
            level: reading.water_level,
            timestamp: reading.timestamp,
        }
    }

    /// Short name for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Level { .. } => "level",
            Self::ButtonPressed => "button_pressed",
            Self::ManualValve { .. } => "manual_valve",
            Self::Mode { .. } => "mode",
            Self::ValveCommand { .. } => "valve_command",
            Self::LevelsHistory { .. } => "levels_history",
            Self::Json(_) => "json",
        }
    }
}

/// A published message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub topic: Topic,
    pub payload: Payload,
}

impl Event {
    pub fn new(topic: Topic, payload: Payload) -> Self {
        Self { topic, payload }
    }
}
