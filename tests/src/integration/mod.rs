//! Cross-crate scenarios. Every test drives a real `TankControllerService`
//! through its `ServiceRunner` and talks to it only through the bus.

pub mod adapters;
pub mod scenarios;

use shared_bus::{EventPublisher, InMemoryEventBus, Payload, Subscription, TopicMap};
use shared_types::{Lifecycle, LevelReading, ServiceRunner, SystemState, Thresholds, ValveOpening};
use std::sync::Arc;
use std::time::Duration;
use tank_controller::{ControllerConfig, ControllerHandle, TankControllerService};
use tokio::time::timeout;

/// L1=50, L2=80, T1=3s, T2=10s.
pub fn test_thresholds() -> Thresholds {
    Thresholds::new(50.0, 80.0, Duration::from_secs(3), Duration::from_secs(10))
        .expect("valid thresholds")
}

/// A running controller plus a tap on its outputs.
pub struct System {
    pub bus: Arc<InMemoryEventBus>,
    pub topics: TopicMap,
    pub handle: ControllerHandle,
    pub runner: ServiceRunner<TankControllerService>,
    outputs: Subscription,
}

impl System {
    pub async fn start() -> Self {
        let bus = Arc::new(InMemoryEventBus::new());
        let topics = TopicMap::default();
        let outputs = bus.subscribe_channel(&[topics.valve_command.clone(), topics.mode.clone()]);

        let config = ControllerConfig {
            thresholds: test_thresholds(),
            history_capacity: 100,
            watchdog_interval: Duration::from_secs(1),
            topics: topics.clone(),
        };
        let service = TankControllerService::new(config, Arc::clone(&bus)).expect("valid config");
        let handle = service.handle();
        let mut runner = ServiceRunner::new(service);
        runner.start().await.expect("controller starts");

        let mut system = Self {
            bus,
            topics,
            handle,
            runner,
            outputs,
        };
        assert_eq!(system.next().await, mode(SystemState::Unconnected));
        system
    }

    /// Next `cmd.valve` or `mode` payload.
    pub async fn next(&mut self) -> Payload {
        timeout(Duration::from_secs(30), self.outputs.recv())
            .await
            .expect("timed out waiting for controller output")
            .expect("output subscription closed")
            .payload
    }

    /// Assert no output arrives within `within`.
    pub async fn assert_quiet(&mut self, within: Duration) {
        let result = timeout(within, self.outputs.recv()).await;
        assert!(result.is_err(), "unexpected output: {result:?}");
    }

    pub fn level(&self, value: f64) {
        self.bus
            .publish(&self.topics.sensor_level, Payload::level(LevelReading::now(value)));
    }

    pub fn button(&self) {
        self.bus
            .publish(&self.topics.button_pressed, Payload::ButtonPressed);
    }

    /// Connect with a low reading and consume the resulting outputs.
    pub async fn connect(&mut self) {
        self.level(10.0);
        assert_eq!(self.next().await, valve(0.0));
        assert_eq!(self.next().await, mode(SystemState::Automatic));
    }

    pub async fn shutdown(mut self) {
        self.runner.stop().await;
    }
}

pub fn valve(percent: f64) -> Payload {
    Payload::ValveCommand {
        opening: ValveOpening::try_new(percent).expect("valid opening"),
    }
}

pub fn mode(state: SystemState) -> Payload {
    Payload::Mode { state }
}
