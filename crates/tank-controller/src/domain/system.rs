//! System-state transition table
//!
//! ```text
//!                first reading
//! [UNCONNECTED] ───────────────→ [AUTOMATIC] ←──── button ────┐
//!       ↑                            │                        │
//!       │  silence > T2              └──── button ────→ [MANUAL]
//!       └──────────────── (AUTOMATIC or MANUAL) ──────────────┘
//! ```

use shared_types::{LevelReading, SystemState, ValveOpening};
use std::time::Duration;

/// Everything that can drive the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerInput {
    Level(LevelReading),
    ButtonPressed,
    ManualValve(ValveOpening),
    /// Periodic watchdog check with the time elapsed since the last reading.
    Watchdog { silent_for: Duration },
}

impl ControllerInput {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Level(_) => "level",
            Self::ButtonPressed => "button",
            Self::ManualValve(_) => "manual_valve",
            Self::Watchdog { .. } => "watchdog",
        }
    }
}

/// What the system layer decided to do with an input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Leave the current state and enter another.
    Enter(SystemState),
    /// Hand the level to the sub-state ladder.
    EvaluateLadder(f64),
    /// Command the valve verbatim.
    ApplyValve(ValveOpening),
    /// Reading kept in history, nothing else.
    RecordOnly,
    Ignore,
}

/// Pure `(state, input)` lookup.
pub fn decide(state: SystemState, input: &ControllerInput, t2: Duration) -> Decision {
    use ControllerInput as In;
    use SystemState::*;

    match (state, input) {
        (Unconnected, In::Level(_)) => Decision::Enter(Automatic),
        (Unconnected, _) => Decision::Ignore,

        (Automatic, In::Level(reading)) => Decision::EvaluateLadder(reading.water_level),
        (Automatic, In::ButtonPressed) => Decision::Enter(Manual),
        (Automatic, In::ManualValve(_)) => Decision::Ignore,

        (Manual, In::Level(_)) => Decision::RecordOnly,
        (Manual, In::ButtonPressed) => Decision::Enter(Automatic),
        (Manual, In::ManualValve(opening)) => Decision::ApplyValve(*opening),

        (Automatic | Manual, In::Watchdog { silent_for }) if *silent_for > t2 => {
            Decision::Enter(Unconnected)
        }
        (Automatic | Manual, In::Watchdog { .. }) => Decision::Ignore,
    }
}
