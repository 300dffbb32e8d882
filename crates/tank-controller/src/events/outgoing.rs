//! Outgoing events
//!
//! | Effect | Topic | Payload |
//! |--------|-------|---------|
//! | `Valve` | `cmd.valve` | `ValveCommand {opening}` |
//! | `Mode` | `mode` | `Mode {state}` |
//! | `History` | `levels.history` | `LevelsHistory {readings}` |

use crate::domain::Effect;
use shared_bus::{Payload, Topic, TopicMap};

pub fn to_event(effect: Effect, topics: &TopicMap) -> (Topic, Payload) {
    match effect {
        Effect::Valve(opening) => (
            topics.valve_command.clone(),
            Payload::ValveCommand { opening },
        ),
        Effect::Mode(state) => (topics.mode.clone(), Payload::Mode { state }),
        Effect::History(readings) => (
            topics.levels_history.clone(),
            Payload::LevelsHistory { readings },
        ),
    }
}
