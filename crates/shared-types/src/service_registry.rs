//! # Service Registry - Start and Stop Everything Together
//!
//! Holds the type-erased runners of every long-running component.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut registry = ServiceRegistry::new();
//! registry.register(ServiceRunner::new(hardware));
//! registry.register(ServiceRunner::new(controller));
//!
//! registry.start_all().await?;
//! // ...
//! registry.stop_all().await;
//! ```
//!
//! Services start in registration order and stop in reverse order.

use crate::service_runner::Lifecycle;
use crate::service_trait::{ServiceResult, ServiceState};
use tracing::{error, info};

/// Ordered set of lifecycle-managed services.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<Box<dyn Lifecycle>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service. It is started later by `start_all()`.
    pub fn register(&mut self, service: impl Lifecycle + 'static) {
        info!("[registry] Registering service {}", service.name());
        self.services.push(Box::new(service));
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Start every registered service.
    ///
    /// On the first failure the services already started are stopped again
    /// and the error is returned.
    pub async fn start_all(&mut self) -> ServiceResult<()> {
        info!("[registry] Starting {} services", self.services.len());

        for index in 0..self.services.len() {
            if let Err(e) = self.services[index].start().await {
                error!("[registry] ✗ {} failed to start: {}", self.services[index].name(), e);
                for started in self.services[..index].iter_mut().rev() {
                    started.stop().await;
                }
                return Err(e);
            }
        }

        info!("[registry] All services started");
        Ok(())
    }

    /// Stop every service in reverse registration order.
    pub async fn stop_all(&mut self) {
        info!("[registry] Stopping all services");
        for service in self.services.iter_mut().rev() {
            service.stop().await;
        }
        info!("[registry] All services stopped");
    }

    /// `(name, state)` for every registered service, in registration order.
    pub fn states(&self) -> Vec<(&'static str, ServiceState)> {
        self.services.iter().map(|s| (s.name(), s.state())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service_runner::ServiceRunner;
    use crate::service_trait::{Service, ServiceError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Recorder {
        name: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
        fail_setup: bool,
    }

    fn recorder(name: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> Recorder {
        Recorder {
            name,
            journal: Arc::clone(journal),
            fail_setup: false,
        }
    }

    #[async_trait]
    impl Service for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn setup(&mut self) -> ServiceResult<()> {
            self.journal.lock().push(format!("setup {}", self.name));
            if self.fail_setup {
                return Err(ServiceError::setup(self.name, "port busy"));
            }
            Ok(())
        }

        async fn run(&mut self) -> ServiceResult<()> {
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn cleanup(&mut self) {
            self.journal.lock().push(format!("cleanup {}", self.name));
        }
    }

    #[tokio::test]
    async fn test_stop_all_runs_in_reverse_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ServiceRegistry::new();
        for name in ["controller", "hardware", "dashboard"] {
            registry.register(ServiceRunner::new(recorder(name, &journal)));
        }
        assert_eq!(registry.len(), 3);

        registry.start_all().await.unwrap();
        assert_eq!(
            *journal.lock(),
            vec!["setup controller", "setup hardware", "setup dashboard"]
        );
        assert!(registry
            .states()
            .iter()
            .all(|(_, state)| *state == ServiceState::Running));

        registry.stop_all().await;
        let cleanups: Vec<String> = journal
            .lock()
            .iter()
            .filter(|line| line.starts_with("cleanup"))
            .cloned()
            .collect();
        assert_eq!(
            cleanups,
            vec!["cleanup dashboard", "cleanup hardware", "cleanup controller"]
        );
        assert!(registry
            .states()
            .iter()
            .all(|(_, state)| *state == ServiceState::Idle));
    }

    #[tokio::test]
    async fn test_setup_failure_rolls_back_started_services() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ServiceRegistry::new();
        registry.register(ServiceRunner::new(recorder("hardware", &journal)));
        registry.register(ServiceRunner::new(Recorder {
            fail_setup: true,
            ..recorder("dashboard", &journal)
        }));
        registry.register(ServiceRunner::new(recorder("controller", &journal)));

        assert!(registry.start_all().await.is_err());
        assert_eq!(
            *journal.lock(),
            vec![
                "setup hardware",
                "setup dashboard",
                "cleanup dashboard",
                "cleanup hardware",
            ]
        );
        assert!(registry
            .states()
            .iter()
            .all(|(_, state)| *state == ServiceState::Idle));
    }
}
