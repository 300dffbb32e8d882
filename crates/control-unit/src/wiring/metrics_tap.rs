//! Wildcard observer that counts and traces every bus event.

use shared_bus::{Handler, InMemoryEventBus, SubscriptionId, Topic};
use std::sync::Arc;
use tank_telemetry::metrics as telemetry;
use tracing::trace;

pub struct MetricsTap {
    bus: Arc<InMemoryEventBus>,
    id: SubscriptionId,
}

impl MetricsTap {
    pub fn attach(bus: &Arc<InMemoryEventBus>) -> Self {
        let id = bus.subscribe(
            &Topic::WILDCARD,
            Handler::inline(|event| {
                telemetry::record_bus_event(event.topic.as_str());
                trace!(topic = %event.topic, kind = event.payload.kind(), "[bus] Event");
                Ok(())
            }),
        );
        Self {
            bus: Arc::clone(bus),
            id,
        }
    }

    pub fn detach(self) {
        self.bus.unsubscribe(&Topic::WILDCARD, self.id);
    }
}
