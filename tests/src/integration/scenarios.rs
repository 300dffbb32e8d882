//! # Controller Scenarios
//!
//! End-to-end behaviour of the controller as seen on the bus:
//!
//! 1. Escalation through the ladder and back to `PRE_ALARM`
//! 2. Manual override with a valve command
//! 3. Sensor silence disconnects exactly once, and a reading reconnects
//! 4. Re-entering `AUTOMATIC` mid-alarm starts over at `NORMAL`

#[cfg(test)]
mod tests {
    use super::super::{mode, valve, System};
    use shared_bus::{EventPublisher, Payload};
    use shared_types::{AutomaticSubState, SystemState, ValveOpening};
    use std::time::Duration;
    use tank_controller::StatusQuery;

    #[tokio::test(start_paused = true)]
    async fn test_escalation_scenario() {
        let mut sys = System::start().await;

        sys.connect().await;
        assert_eq!(sys.handle.status().sub_state, Some(AutomaticSubState::Normal));

        sys.level(60.0);
        assert_eq!(sys.next().await, valve(0.0));
        assert_eq!(
            sys.handle.status().sub_state,
            Some(AutomaticSubState::TrackingPreAlarm)
        );

        tokio::time::advance(Duration::from_secs(3)).await;
        sys.level(60.0);
        assert_eq!(sys.next().await, valve(50.0));
        assert_eq!(sys.handle.status().sub_state, Some(AutomaticSubState::PreAlarm));

        sys.level(90.0);
        assert_eq!(sys.next().await, valve(100.0));
        assert_eq!(sys.handle.status().sub_state, Some(AutomaticSubState::Alarm));

        sys.level(70.0);
        assert_eq!(sys.next().await, valve(50.0));
        assert_eq!(sys.handle.status().sub_state, Some(AutomaticSubState::PreAlarm));

        sys.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_reading_is_idempotent() {
        let mut sys = System::start().await;
        sys.connect().await;

        sys.level(60.0);
        assert_eq!(sys.next().await, valve(0.0));
        sys.level(60.0);
        sys.assert_quiet(Duration::from_millis(500)).await;
        assert_eq!(
            sys.handle.status().sub_state,
            Some(AutomaticSubState::TrackingPreAlarm)
        );

        sys.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_override_scenario() {
        let mut sys = System::start().await;
        sys.connect().await;

        sys.button();
        assert_eq!(sys.next().await, mode(SystemState::Manual));

        sys.bus.publish(
            &sys.topics.manual_valve_command,
            Payload::ManualValve {
                opening: ValveOpening::try_new(35.0).unwrap(),
            },
        );
        assert_eq!(sys.next().await, valve(35.0));

        let status = sys.handle.status();
        assert_eq!(status.state, SystemState::Manual);
        assert_eq!(status.valve_opening.percent(), 35.0);

        // Readings are still recorded in MANUAL but never move the valve.
        sys.level(95.0);
        sys.assert_quiet(Duration::from_millis(500)).await;
        assert_eq!(sys.handle.status().water_level, Some(95.0));

        sys.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_disconnects_once_and_reading_reconnects() {
        let mut sys = System::start().await;
        sys.connect().await;
        sys.level(90.0);
        assert_eq!(sys.next().await, valve(100.0));

        // No readings: paused time runs forward to the watchdog.
        assert_eq!(sys.next().await, valve(0.0));
        assert_eq!(sys.next().await, mode(SystemState::Unconnected));
        sys.assert_quiet(Duration::from_secs(30)).await;

        sys.level(20.0);
        assert_eq!(sys.next().await, valve(0.0));
        assert_eq!(sys.next().await, mode(SystemState::Automatic));

        sys.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reentering_automatic_mid_alarm() {
        let mut sys = System::start().await;
        sys.connect().await;
        sys.level(95.0);
        assert_eq!(sys.next().await, valve(100.0));

        sys.button();
        assert_eq!(sys.next().await, mode(SystemState::Manual));
        sys.button();
        assert_eq!(sys.next().await, valve(0.0));
        assert_eq!(sys.next().await, mode(SystemState::Automatic));
        assert_eq!(sys.handle.status().sub_state, Some(AutomaticSubState::Normal));

        // The next reading climbs straight back to ALARM.
        sys.level(95.0);
        assert_eq!(sys.next().await, valve(100.0));

        sys.shutdown().await;
    }
}
