//! # Service Runner
//!
//! Drives a [`Service`] through `IDLE → RUNNING → STOPPING → IDLE`.
//!
//! `start()` moves the service value into its own tokio task and returns once
//! `setup()` has completed there, so anything a service subscribes to in
//! `setup()` is in place before the next service starts. A failed `setup()`
//! is returned from `start()`.
//!
//! `stop()` fires a oneshot; the task drops the `run()` future at its next
//! suspension point, runs `cleanup()` and hands the service value back, so the
//! same runner can be started again later.

use crate::service_trait::{Service, ServiceError, ServiceErrorKind, ServiceResult, ServiceState};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Object-safe lifecycle control, used by the registry.
#[async_trait]
pub trait Lifecycle: Send {
    fn name(&self) -> &'static str;

    fn state(&self) -> ServiceState;

    /// Schedule the service and wait for its `setup()`. A second call while
    /// running only logs a warning.
    async fn start(&mut self) -> ServiceResult<()>;

    /// Request cancellation and wait until the task has unwound.
    /// A no-op while idle.
    async fn stop(&mut self);
}

/// Owns one service and its task.
pub struct ServiceRunner<S: Service> {
    name: &'static str,
    state: Arc<Mutex<ServiceState>>,
    /// Present while idle.
    service: Option<S>,
    /// Present while running (or finished but not yet reclaimed).
    task: Option<JoinHandle<S>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl<S: Service> ServiceRunner<S> {
    pub fn new(service: S) -> Self {
        Self {
            name: service.name(),
            state: Arc::new(Mutex::new(ServiceState::Idle)),
            service: Some(service),
            task: None,
            stop_tx: None,
        }
    }

    /// Borrow the service while it is idle.
    pub fn service(&self) -> Option<&S> {
        self.service.as_ref()
    }

    /// Take the finished task's service value back.
    async fn reclaim(&mut self) {
        self.stop_tx = None;
        let Some(task) = self.task.take() else {
            return;
        };
        match task.await {
            Ok(service) => self.service = Some(service),
            Err(e) => error!("[lifecycle] {} task aborted: {}", self.name, e),
        }
    }
}

#[async_trait]
impl<S: Service> Lifecycle for ServiceRunner<S> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn state(&self) -> ServiceState {
        // A panicked task never gets to reset the shared state.
        if self.task.as_ref().is_some_and(JoinHandle::is_finished) {
            return ServiceState::Idle;
        }
        *self.state.lock()
    }

    async fn start(&mut self) -> ServiceResult<()> {
        if self.state() != ServiceState::Idle {
            warn!("[lifecycle] {} already running", self.name);
            return Ok(());
        }

        self.reclaim().await;
        let Some(service) = self.service.take() else {
            return Err(ServiceError::new(
                self.name,
                ServiceErrorKind::Panicked,
                "service state lost after a panic",
            ));
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        *self.state.lock() = ServiceState::Running;
        self.task = Some(tokio::spawn(drive(
            service,
            stop_rx,
            ready_tx,
            Arc::clone(&self.state),
        )));
        self.stop_tx = Some(stop_tx);

        let setup = match ready_rx.await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::new(
                self.name,
                ServiceErrorKind::Panicked,
                "task ended during setup",
            )),
        };
        if let Err(e) = setup {
            error!("[lifecycle] {} setup failed: {}", self.name, e);
            self.reclaim().await;
            *self.state.lock() = ServiceState::Idle;
            return Err(e);
        }

        info!("[lifecycle] {} started", self.name);
        Ok(())
    }

    async fn stop(&mut self) {
        if self.state() == ServiceState::Idle {
            debug!("[lifecycle] {} not running, nothing to stop", self.name);
            self.reclaim().await;
            return;
        }

        *self.state.lock() = ServiceState::Stopping;
        if let Some(stop_tx) = self.stop_tx.take() {
            // The task may have finished in the meantime.
            let _ = stop_tx.send(());
        }
        self.reclaim().await;
        *self.state.lock() = ServiceState::Idle;

        info!("[lifecycle] {} stopped", self.name);
    }
}

enum Outcome {
    Cancelled,
    /// Reported to `start()` through the ready channel.
    SetupFailed,
    Finished(ServiceResult<()>),
}

/// Task body: setup, run until done or cancelled, cleanup.
async fn drive<S: Service>(
    mut service: S,
    mut stop_rx: oneshot::Receiver<()>,
    ready_tx: oneshot::Sender<ServiceResult<()>>,
    state: Arc<Mutex<ServiceState>>,
) -> S {
    let name = service.name();

    let outcome = tokio::select! {
        biased;
        _ = &mut stop_rx => Outcome::Cancelled,
        outcome = setup_and_run(&mut service, ready_tx) => outcome,
    };

    match outcome {
        Outcome::Cancelled => debug!("[lifecycle] {} cancelled", name),
        Outcome::SetupFailed => {}
        Outcome::Finished(Ok(())) => info!("[lifecycle] {} finished", name),
        Outcome::Finished(Err(e)) => error!("[lifecycle] {} failed: {}", name, e),
    }

    service.cleanup().await;
    *state.lock() = ServiceState::Idle;
    service
}

async fn setup_and_run<S: Service>(
    service: &mut S,
    ready_tx: oneshot::Sender<ServiceResult<()>>,
) -> Outcome {
    if let Err(e) = service.setup().await {
        let _ = ready_tx.send(Err(e));
        return Outcome::SetupFailed;
    }
    let _ = ready_tx.send(Ok(()));
    Outcome::Finished(service.run().await)
}
