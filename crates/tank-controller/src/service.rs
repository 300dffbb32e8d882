//! Tank Controller Service
//!
//! Wraps [`TankStateMachine`] in a [`Service`]: a single task that owns the
//! machine, drains one bus queue holding every input topic in arrival order,
//! and runs the sensor watchdog on a fixed interval.

use crate::domain::{Effect, TankStateMachine};
use crate::error::{ControllerError, ControllerResult};
use crate::events::{to_event, to_input};
use crate::ports::inbound::ControllerHandle;
use crate::SERVICE_NAME;
use async_trait::async_trait;
use shared_bus::{Event, EventPublisher, InMemoryEventBus, Subscription, TopicMap};
use shared_types::{ControllerStatus, Service, ServiceResult, Thresholds};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Controller configuration
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub thresholds: Thresholds,
    /// Readings retained for `levels.history`
    pub history_capacity: usize,
    /// How often the watchdog checks for sensor silence
    pub watchdog_interval: Duration,
    pub topics: TopicMap,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            history_capacity: 100,
            watchdog_interval: Duration::from_secs(1),
            topics: TopicMap::default(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> ControllerResult<()> {
        if self.history_capacity == 0 {
            return Err(ControllerError::ZeroHistoryCapacity);
        }
        if self.watchdog_interval.is_zero() {
            return Err(ControllerError::ZeroWatchdogInterval);
        }
        Ok(())
    }
}

/// The controller as a long-running service.
pub struct TankControllerService {
    config: ControllerConfig,
    bus: Arc<InMemoryEventBus>,
    machine: TankStateMachine,
    inbox: Option<Subscription>,
    status_tx: watch::Sender<ControllerStatus>,
}

impl TankControllerService {
    pub fn new(config: ControllerConfig, bus: Arc<InMemoryEventBus>) -> ControllerResult<Self> {
        config.validate()?;
        let machine = TankStateMachine::new(config.thresholds, config.history_capacity, now());
        let (status_tx, _) = watch::channel(machine.status());
        Ok(Self {
            config,
            bus,
            machine,
            inbox: None,
            status_tx,
        })
    }

    /// Status handle for adapters. Valid across restarts.
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle::new(self.status_tx.subscribe())
    }

    pub fn machine(&self) -> &TankStateMachine {
        &self.machine
    }

    fn on_event(&mut self, event: &Event) {
        match to_input(event, &self.config.topics) {
            Ok(input) => {
                let effects = self.machine.handle(input, now());
                self.apply(effects);
            }
            Err(rejected) => warn!("[controller] Dropped event: {}", rejected),
        }
    }

    fn on_watchdog(&mut self) {
        let effects = self.machine.check_watchdog(now());
        if !effects.is_empty() {
            warn!(
                t2_ms = self.machine.thresholds().t2().as_millis() as u64,
                "[controller] Sensor silent, disconnecting"
            );
            self.apply(effects);
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            let (topic, payload) = to_event(effect, &self.config.topics);
            let delivered = self.bus.publish(&topic, payload);
            debug!(%topic, delivered, "[controller] Published");
        }
        self.status_tx.send_replace(self.machine.status());
    }
}

#[async_trait]
impl Service for TankControllerService {
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn setup(&mut self) -> ServiceResult<()> {
        let topics = &self.config.topics;
        self.inbox = Some(self.bus.subscribe_channel(&[
            topics.sensor_level.clone(),
            topics.button_pressed.clone(),
            topics.manual_valve_command.clone(),
        ]));
        info!(
            state = %self.machine.state(),
            l1 = self.machine.thresholds().l1(),
            l2 = self.machine.thresholds().l2(),
            "[controller] Subscribed to input topics"
        );
        self.apply(vec![Effect::Mode(self.machine.state())]);
        Ok(())
    }

    async fn run(&mut self) -> ServiceResult<()> {
        let mut inbox = self.inbox.take().ok_or(ControllerError::NotSubscribed)?;
        let mut watchdog = interval(self.config.watchdog_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = inbox.recv() => match event {
                    Some(event) => self.on_event(&event),
                    None => return Err(ControllerError::InboxClosed.into()),
                },
                _ = watchdog.tick() => self.on_watchdog(),
            }
        }
    }

    async fn cleanup(&mut self) {
        self.inbox = None;
        info!(state = %self.machine.state(), "[controller] Stopped");
    }
}

fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}
