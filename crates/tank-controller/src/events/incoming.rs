//! Incoming events
//!
//! | Topic | Accepted payloads |
//! |-------|-------------------|
//! | `sensor.level` | `Level`, `Json {"level", "timestamp"?}` |
//! | `button.pressed` | anything (trigger only) |
//! | `manual.valve_command` | `ManualValve`, `Json {"opening"}` |

use crate::domain::ControllerInput;
use chrono::{DateTime, Utc};
use shared_bus::{Event, Payload, TopicMap};
use shared_types::{LevelReading, ValidationError, ValveOpening};
use thiserror::Error;

/// Why an event did not become a controller input.
#[derive(Debug, Error, PartialEq)]
pub enum RejectedEvent {
    #[error("topic {0} is not a controller input")]
    UnknownTopic(String),

    #[error("unexpected {kind} payload on {topic}")]
    UnexpectedPayload { topic: String, kind: &'static str },

    #[error("invalid payload on {topic}: {source}")]
    Invalid {
        topic: String,
        #[source]
        source: ValidationError,
    },
}

/// Map a bus event onto a controller input.
pub fn to_input(event: &Event, topics: &TopicMap) -> Result<ControllerInput, RejectedEvent> {
    let topic = &event.topic;
    let invalid = |source| RejectedEvent::Invalid {
        topic: topic.to_string(),
        source,
    };
    let unexpected = || RejectedEvent::UnexpectedPayload {
        topic: topic.to_string(),
        kind: event.payload.kind(),
    };

    if *topic == topics.sensor_level {
        let (level, timestamp) = match &event.payload {
            Payload::Level { level, timestamp } => (*level, *timestamp),
            Payload::Json(value) => {
                let level = value
                    .get("level")
                    .and_then(|v| v.as_f64())
                    .ok_or_else(unexpected)?;
                let timestamp = value
                    .get("timestamp")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<DateTime<Utc>>().ok())
                    .unwrap_or_else(Utc::now);
                (level, timestamp)
            }
            _ => return Err(unexpected()),
        };
        let reading = LevelReading::validated(level, timestamp).map_err(invalid)?;
        Ok(ControllerInput::Level(reading))
    } else if *topic == topics.button_pressed {
        Ok(ControllerInput::ButtonPressed)
    } else if *topic == topics.manual_valve_command {
        let opening = match &event.payload {
            Payload::ManualValve { opening } => *opening,
            Payload::Json(value) => {
                let percent = value
                    .get("opening")
                    .and_then(|v| v.as_f64())
                    .ok_or_else(unexpected)?;
                ValveOpening::try_new(percent).map_err(invalid)?
            }
            _ => return Err(unexpected()),
        };
        Ok(ControllerInput::ManualValve(opening))
    } else {
        Err(RejectedEvent::UnknownTopic(topic.to_string()))
    }
}
