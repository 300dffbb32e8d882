//! # Service Container
//!
//! Builds the bus, the controller and the enabled adapters from one
//! [`ControlUnitConfig`] and owns their runners.
//!
//! ## Start order
//!
//! ```text
//! dashboard → hardware → cloud → controller
//! ```
//!
//! Adapters subscribe before the controller announces its initial mode, and
//! the controller is the first to stop.

use crate::adapters::{CloudAdapter, DashboardAdapter, HardwareAdapter};
use crate::container::config::{ConfigError, ControlUnitConfig};
use crate::wiring::MetricsTap;
use shared_bus::InMemoryEventBus;
use shared_types::{ServiceRegistry, ServiceResult, ServiceRunner, ServiceState};
use std::sync::Arc;
use tank_controller::{ControllerError, ControllerHandle, TankControllerService};
use tank_telemetry::metrics as telemetry;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("controller error: {0}")]
    Controller(#[from] ControllerError),
}

pub struct ServiceContainer {
    bus: Arc<InMemoryEventBus>,
    controller: ControllerHandle,
    registry: ServiceRegistry,
    tap: Option<MetricsTap>,
}

impl ServiceContainer {
    pub fn build(config: &ControlUnitConfig) -> Result<Self, ContainerError> {
        config.validate()?;

        let bus = Arc::new(InMemoryEventBus::new());
        let tap = MetricsTap::attach(&bus);
        let topics = config.topics.clone();

        let controller = TankControllerService::new(config.controller_config()?, Arc::clone(&bus))?;
        let handle = controller.handle();

        let mut registry = ServiceRegistry::new();
        if config.dashboard.enabled {
            registry.register(ServiceRunner::new(DashboardAdapter::new(
                config.dashboard.clone(),
                Arc::clone(&bus),
                topics.clone(),
                Arc::new(handle.clone()),
            )));
        }
        if config.hardware.enabled {
            registry.register(ServiceRunner::new(HardwareAdapter::new(
                config.hardware.clone(),
                Arc::clone(&bus),
                topics.clone(),
            )));
        }
        if config.cloud.enabled {
            registry.register(ServiceRunner::new(CloudAdapter::new(
                config.cloud.clone(),
                Arc::clone(&bus),
                topics,
            )));
        }
        registry.register(ServiceRunner::new(controller));

        info!(services = registry.len(), "Service container built");
        Ok(Self {
            bus,
            controller: handle,
            registry,
            tap: Some(tap),
        })
    }

    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    pub fn controller(&self) -> ControllerHandle {
        self.controller.clone()
    }

    pub fn states(&self) -> Vec<(&'static str, ServiceState)> {
        self.registry.states()
    }

    pub async fn start(&mut self) -> ServiceResult<()> {
        let result = self.registry.start_all().await;
        self.report_running();
        result
    }

    pub async fn stop(&mut self) {
        self.registry.stop_all().await;
        self.report_running();
        if let Some(tap) = self.tap.take() {
            tap.detach();
        }
    }

    fn report_running(&self) {
        let running = self
            .registry
            .states()
            .iter()
            .filter(|(_, state)| *state == ServiceState::Running)
            .count();
        telemetry::SERVICES_RUNNING.set(running as i64);
    }
}
