//! Tank state machine
//!
//! Owns `SystemState`, `AutomaticSubState`, the reading history and the last
//! commanded valve opening. Time is passed in explicitly; every call returns
//! the effects to publish, in order.

use crate::domain::history::LevelHistory;
use crate::domain::ladder::next_sub_state;
use crate::domain::system::{decide, ControllerInput, Decision};
use crate::metrics;
use shared_types::{
    AutomaticSubState, ControllerStatus, LevelReading, SystemState, Thresholds, ValveOpening,
};
use std::time::Instant;
use tracing::{debug, info};

/// Something the controller wants published.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Valve(ValveOpening),
    Mode(SystemState),
    /// Full retained window, oldest first.
    History(Vec<LevelReading>),
}

#[derive(Debug)]
pub struct TankStateMachine {
    thresholds: Thresholds,
    state: SystemState,
    sub_state: AutomaticSubState,
    sub_state_entered_at: Instant,
    last_reading_at: Instant,
    last_level: Option<f64>,
    valve: ValveOpening,
    history: LevelHistory,
}

impl TankStateMachine {
    /// Starts `UNCONNECTED` with an empty history.
    pub fn new(thresholds: Thresholds, history_capacity: usize, now: Instant) -> Self {
        Self {
            thresholds,
            state: SystemState::Unconnected,
            sub_state: AutomaticSubState::Normal,
            sub_state_entered_at: now,
            last_reading_at: now,
            last_level: None,
            valve: ValveOpening::CLOSED,
            history: LevelHistory::with_capacity(history_capacity),
        }
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    /// `None` outside `AUTOMATIC`.
    pub fn sub_state(&self) -> Option<AutomaticSubState> {
        (self.state == SystemState::Automatic).then_some(self.sub_state)
    }

    pub fn valve(&self) -> ValveOpening {
        self.valve
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            state: self.state,
            sub_state: self.sub_state(),
            water_level: self.last_level,
            valve_opening: self.valve,
            history_len: self.history.len(),
            last_reading_at: self.history.latest().map(|r| r.timestamp),
        }
    }

    /// Apply one input. Never fails: every input either acts or is ignored.
    pub fn handle(&mut self, input: ControllerInput, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();

        if let ControllerInput::Level(reading) = input {
            self.record(reading, now, &mut effects);
        }

        match decide(self.state, &input, self.thresholds.t2()) {
            Decision::Enter(next) => self.transition_to(next, now, &mut effects),
            Decision::EvaluateLadder(level) => self.evaluate_ladder(level, now, &mut effects),
            Decision::ApplyValve(opening) => {
                info!("[controller] Manual valve command {}", opening);
                self.command_valve(opening, &mut effects);
            }
            Decision::RecordOnly => {}
            Decision::Ignore => {
                debug!(state = %self.state, input = input.name(), "[controller] Input ignored");
            }
        }

        effects
    }

    /// Watchdog tick: leaves the connected states once the sensor has been
    /// silent for longer than T2. Fires once; `UNCONNECTED` ignores it.
    pub fn check_watchdog(&mut self, now: Instant) -> Vec<Effect> {
        let silent_for = now.saturating_duration_since(self.last_reading_at);
        self.handle(ControllerInput::Watchdog { silent_for }, now)
    }

    fn record(&mut self, reading: LevelReading, now: Instant, effects: &mut Vec<Effect>) {
        self.last_reading_at = now;
        self.last_level = Some(reading.water_level);
        self.history.push(reading);
        metrics::record_reading(reading.water_level);
        effects.push(Effect::History(self.history.to_vec()));
    }

    fn transition_to(&mut self, next: SystemState, now: Instant, effects: &mut Vec<Effect>) {
        let previous = self.state;
        self.on_exit(previous);
        self.state = next;
        info!("[controller] {} -> {}", previous, next);
        metrics::record_state_transition(next);
        self.on_enter(next, now, effects);
    }

    fn on_exit(&mut self, state: SystemState) {
        if state == SystemState::Automatic {
            debug!(sub_state = %self.sub_state, "[controller] Leaving automatic control");
        }
    }

    fn on_enter(&mut self, state: SystemState, now: Instant, effects: &mut Vec<Effect>) {
        match state {
            SystemState::Automatic => {
                self.enter_sub_state(AutomaticSubState::Normal, now, effects);
            }
            SystemState::Unconnected => {
                metrics::record_watchdog_timeout();
                self.command_valve(ValveOpening::CLOSED, effects);
            }
            SystemState::Manual => {}
        }
        effects.push(Effect::Mode(state));
    }

    fn evaluate_ladder(&mut self, level: f64, now: Instant, effects: &mut Vec<Effect>) {
        let dwell = now.saturating_duration_since(self.sub_state_entered_at);
        if let Some(next) = next_sub_state(self.sub_state, level, dwell, &self.thresholds) {
            info!(
                level,
                dwell_ms = dwell.as_millis() as u64,
                "[controller] {} -> {}",
                self.sub_state,
                next
            );
            self.enter_sub_state(next, now, effects);
        }
    }

    fn enter_sub_state(&mut self, next: AutomaticSubState, now: Instant, effects: &mut Vec<Effect>) {
        self.sub_state = next;
        self.sub_state_entered_at = now;
        metrics::record_sub_state_transition(next);
        self.command_valve(next.valve_opening(), effects);
    }

    fn command_valve(&mut self, opening: ValveOpening, effects: &mut Vec<Effect>) {
        self.valve = opening;
        metrics::set_valve_opening(opening.percent());
        effects.push(Effect::Valve(opening));
    }

    #[cfg(test)]
    pub fn force_state(&mut self, state: SystemState, sub_state: AutomaticSubState) {
        self.state = state;
        self.sub_state = sub_state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use AutomaticSubState::*;

    const T1: Duration = Duration::from_secs(30);
    const T2: Duration = Duration::from_secs(10);

    struct Clocked {
        machine: TankStateMachine,
        now: Instant,
    }

    impl Clocked {
        fn new() -> Self {
            let now = Instant::now();
            let thresholds = Thresholds::new(50.0, 80.0, T1, T2).unwrap();
            Self {
                machine: TankStateMachine::new(thresholds, 20, now),
                now,
            }
        }

        fn advance(&mut self, by: Duration) {
            self.now += by;
        }

        fn level(&mut self, value: f64) -> Vec<Effect> {
            self.machine
                .handle(ControllerInput::Level(LevelReading::now(value)), self.now)
        }

        fn button(&mut self) -> Vec<Effect> {
            self.machine.handle(ControllerInput::ButtonPressed, self.now)
        }

        fn manual(&mut self, percent: f64) -> Vec<Effect> {
            let opening = ValveOpening::try_new(percent).unwrap();
            self.machine
                .handle(ControllerInput::ManualValve(opening), self.now)
        }

        fn watchdog(&mut self) -> Vec<Effect> {
            self.machine.check_watchdog(self.now)
        }
    }

    fn without_history(effects: Vec<Effect>) -> Vec<Effect> {
        effects
            .into_iter()
            .filter(|e| !matches!(e, Effect::History(_)))
            .collect()
    }

    #[test]
    fn test_starts_unconnected() {
        let t = Clocked::new();
        let status = t.machine.status();
        assert_eq!(status.state, SystemState::Unconnected);
        assert_eq!(status.sub_state, None);
        assert_eq!(status.history_len, 0);
        assert_eq!(status.valve_opening, ValveOpening::CLOSED);
    }

    #[test]
    fn test_escalation_scenario() {
        let mut t = Clocked::new();

        let effects = without_history(t.level(10.0));
        assert_eq!(
            effects,
            vec![
                Effect::Valve(ValveOpening::CLOSED),
                Effect::Mode(SystemState::Automatic)
            ]
        );
        assert_eq!(t.machine.sub_state(), Some(Normal));

        assert_eq!(without_history(t.level(60.0)), vec![Effect::Valve(ValveOpening::CLOSED)]);
        assert_eq!(t.machine.sub_state(), Some(TrackingPreAlarm));

        t.advance(T1);
        assert_eq!(without_history(t.level(60.0)), vec![Effect::Valve(ValveOpening::HALF)]);
        assert_eq!(t.machine.sub_state(), Some(PreAlarm));

        assert_eq!(without_history(t.level(90.0)), vec![Effect::Valve(ValveOpening::FULL)]);
        assert_eq!(t.machine.sub_state(), Some(Alarm));

        assert_eq!(without_history(t.level(70.0)), vec![Effect::Valve(ValveOpening::HALF)]);
        assert_eq!(t.machine.sub_state(), Some(PreAlarm));
        assert_eq!(t.machine.valve(), ValveOpening::HALF);
        assert_eq!(t.machine.status().history_len, 5);
    }

    #[test]
    fn test_tracking_dwell_restarts_on_reentry() {
        let mut t = Clocked::new();
        t.level(10.0);
        t.level(60.0);
        t.advance(T1 / 2);
        t.level(40.0);
        assert_eq!(t.machine.sub_state(), Some(Normal));
        t.level(60.0);
        t.advance(T1 / 2);
        t.level(60.0);
        assert_eq!(t.machine.sub_state(), Some(TrackingPreAlarm));
        t.advance(T1 / 2);
        t.level(60.0);
        assert_eq!(t.machine.sub_state(), Some(PreAlarm));
    }

    #[test]
    fn test_every_reading_publishes_history() {
        let mut t = Clocked::new();
        t.level(10.0);
        let effects = t.level(20.0);
        let Some(Effect::History(readings)) = effects.first() else {
            panic!("expected history first, got {effects:?}");
        };
        let levels: Vec<f64> = readings.iter().map(|r| r.water_level).collect();
        assert_eq!(levels, vec![10.0, 20.0]);
    }

    #[test]
    fn test_manual_mode_and_valve_commands() {
        let mut t = Clocked::new();
        t.level(10.0);

        assert_eq!(t.button(), vec![Effect::Mode(SystemState::Manual)]);
        assert_eq!(t.machine.sub_state(), None);

        assert_eq!(
            t.manual(35.0),
            vec![Effect::Valve(ValveOpening::try_new(35.0).unwrap())]
        );
        assert_eq!(t.machine.valve().percent(), 35.0);

        // Readings in MANUAL are recorded only.
        assert_eq!(without_history(t.level(95.0)), vec![]);
        assert_eq!(t.machine.valve().percent(), 35.0);
        assert_eq!(t.machine.status().water_level, Some(95.0));
    }

    #[test]
    fn test_manual_command_ignored_in_automatic() {
        let mut t = Clocked::new();
        t.level(10.0);
        assert!(t.manual(80.0).is_empty());
        assert_eq!(t.machine.valve(), ValveOpening::CLOSED);
    }

    #[test]
    fn test_reentering_automatic_mid_alarm_resets_to_normal() {
        let mut t = Clocked::new();
        t.level(10.0);
        t.level(95.0);
        assert_eq!(t.machine.sub_state(), Some(Alarm));

        t.button();
        assert_eq!(t.machine.state(), SystemState::Manual);

        let effects = t.button();
        assert_eq!(
            effects,
            vec![
                Effect::Valve(ValveOpening::CLOSED),
                Effect::Mode(SystemState::Automatic)
            ]
        );
        assert_eq!(t.machine.sub_state(), Some(Normal));
        assert_eq!(t.machine.valve(), ValveOpening::CLOSED);
    }

    #[test]
    fn test_watchdog_fires_exactly_once() {
        let mut t = Clocked::new();
        t.level(10.0);
        t.level(95.0);

        t.advance(T2);
        assert!(t.watchdog().is_empty());

        t.advance(Duration::from_millis(1));
        assert_eq!(
            t.watchdog(),
            vec![
                Effect::Valve(ValveOpening::CLOSED),
                Effect::Mode(SystemState::Unconnected)
            ]
        );

        for _ in 0..5 {
            t.advance(Duration::from_secs(1));
            assert!(t.watchdog().is_empty());
        }
        assert_eq!(t.machine.state(), SystemState::Unconnected);
        assert_eq!(t.machine.sub_state(), None);
    }

    #[test]
    fn test_watchdog_in_manual() {
        let mut t = Clocked::new();
        t.level(10.0);
        t.button();
        t.advance(T2 + Duration::from_secs(1));
        let effects = t.watchdog();
        assert_eq!(effects.last(), Some(&Effect::Mode(SystemState::Unconnected)));
    }

    #[test]
    fn test_reading_while_unconnected_reconnects() {
        let mut t = Clocked::new();
        t.level(10.0);
        t.level(95.0);
        t.advance(T2 * 2);
        t.watchdog();

        let effects = without_history(t.level(95.0));
        // First reading only reconnects; the ladder sees the next one.
        assert_eq!(
            effects,
            vec![
                Effect::Valve(ValveOpening::CLOSED),
                Effect::Mode(SystemState::Automatic)
            ]
        );
        assert_eq!(t.machine.sub_state(), Some(Normal));
        t.level(95.0);
        assert_eq!(t.machine.sub_state(), Some(Alarm));
    }

    #[test]
    fn test_button_while_unconnected_ignored() {
        let mut t = Clocked::new();
        assert!(t.button().is_empty());
        assert_eq!(t.machine.state(), SystemState::Unconnected);
    }

    #[test]
    fn test_force_state_into_alarm() {
        let mut t = Clocked::new();
        t.machine.force_state(SystemState::Automatic, Alarm);
        assert_eq!(without_history(t.level(90.0)), vec![]);
        assert_eq!(t.machine.sub_state(), Some(Alarm));
    }
}
