//! Driving ports (read side)
//!
//! Adapters never touch the state machine directly. They read snapshots
//! through [`StatusQuery`] and send commands over the bus.

use shared_types::{ControllerStatus, SystemState};
use tokio::sync::watch;

/// Read-only view of the controller.
pub trait StatusQuery: Send + Sync {
    /// Snapshot taken after the last processed input.
    fn status(&self) -> ControllerStatus;

    fn state(&self) -> SystemState {
        self.status().state
    }
}

/// Cloneable status handle backed by a watch channel.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    rx: watch::Receiver<ControllerStatus>,
}

impl ControllerHandle {
    pub(crate) fn new(rx: watch::Receiver<ControllerStatus>) -> Self {
        Self { rx }
    }

    /// Wait for the next published snapshot.
    ///
    /// Returns `false` once the controller has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until `predicate` holds for the current snapshot.
    pub async fn wait_for<F>(&mut self, predicate: F) -> Option<ControllerStatus>
    where
        F: FnMut(&ControllerStatus) -> bool,
    {
        self.rx.wait_for(predicate).await.ok().map(|s| s.clone())
    }
}

impl StatusQuery for ControllerHandle {
    fn status(&self) -> ControllerStatus {
        self.rx.borrow().clone()
    }
}
