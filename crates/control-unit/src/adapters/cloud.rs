//! # Cloud Adapter
//!
//! MQTT link to the broker the level sensor node publishes to.
//!
//! - Subscribes to `level_topic`; every valid payload becomes a `sensor.level`
//!   bus event.
//! - Mirrors `mode` and `cmd.valve` bus events to `mode_topic` and
//!   `valve_topic` as JSON.
//!
//! Broker failures are logged and retried; the controller only ever notices
//! them as sensor silence.

use crate::adapters::{AdapterError, AdapterResult};
use crate::container::config::CloudConfig;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rumqttc::{AsyncClient, Event as MqttEvent, MqttOptions, Packet, QoS};
use serde::Deserialize;
use serde_json::json;
use shared_bus::{Event, EventPublisher, InMemoryEventBus, Payload, Subscription, TopicMap};
use shared_types::{LevelReading, Service, ServiceError, ServiceResult};
use std::sync::Arc;
use tank_telemetry::metrics as telemetry;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

const ADAPTER: &str = "cloud";

/// Requests the client buffers before `try_publish` starts failing.
const CLIENT_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LevelPayload {
    Bare(f64),
    Object {
        level: f64,
        #[serde(default)]
        timestamp: Option<Timestamp>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Unix(f64),
    Rfc3339(DateTime<Utc>),
}

impl Timestamp {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Rfc3339(at) => Some(*at),
            Self::Unix(secs) => {
                if !secs.is_finite() {
                    return None;
                }
                Utc.timestamp_millis_opt((secs * 1000.0) as i64).single()
            }
        }
    }
}

/// Parse a level message from the broker.
///
/// Accepts `{"level": 0.27, "timestamp": ...}` (RFC 3339 or unix seconds,
/// optional) or a bare number. Readings without a usable timestamp are
/// stamped on receipt.
pub fn parse_level_payload(bytes: &[u8]) -> AdapterResult<LevelReading> {
    let payload: LevelPayload = serde_json::from_slice(bytes).map_err(|e| {
        AdapterError::Malformed(format!("{e}: {:?}", String::from_utf8_lossy(bytes)))
    })?;

    let (level, timestamp) = match payload {
        LevelPayload::Bare(level) => (level, None),
        LevelPayload::Object { level, timestamp } => {
            (level, timestamp.as_ref().and_then(Timestamp::to_utc))
        }
    };
    Ok(LevelReading::validated(
        level,
        timestamp.unwrap_or_else(Utc::now),
    )?)
}

/// Broker message for a bus event, if it is one the broker mirrors.
fn outbound_message(config: &CloudConfig, event: &Event) -> Option<(String, Vec<u8>)> {
    let (topic, body) = match &event.payload {
        Payload::Mode { state } => (&config.mode_topic, json!({ "mode": state })),
        Payload::ValveCommand { opening } => (
            &config.valve_topic,
            json!({ "valve_opening": opening.percent() }),
        ),
        _ => return None,
    };
    Some((topic.clone(), body.to_string().into_bytes()))
}

pub struct CloudAdapter {
    config: CloudConfig,
    bus: Arc<InMemoryEventBus>,
    topics: TopicMap,
    outbound: Option<Subscription>,
}

impl CloudAdapter {
    pub fn new(config: CloudConfig, bus: Arc<InMemoryEventBus>, topics: TopicMap) -> Self {
        Self {
            config,
            bus,
            topics,
            outbound: None,
        }
    }

    fn options(&self) -> MqttOptions {
        let suffix = Uuid::new_v4().simple().to_string();
        let client_id = format!("{}-{}", self.config.client_id, &suffix[..8]);
        let mut options = MqttOptions::new(client_id, self.config.host.clone(), self.config.port);
        options.set_keep_alive(self.config.keep_alive);
        options.set_clean_session(true);
        options
    }

    fn on_publish(&self, topic: &str, bytes: &[u8]) {
        if topic != self.config.level_topic {
            debug!(topic, "[cloud] Ignoring message on unexpected topic");
            return;
        }
        match parse_level_payload(bytes) {
            Ok(reading) => {
                telemetry::record_frame(ADAPTER, "level");
                self.bus
                    .publish(&self.topics.sensor_level, Payload::level(reading));
            }
            Err(e) => {
                warn!("[cloud] Skipping level message: {}", e);
                telemetry::record_rejected(ADAPTER, e.reason());
            }
        }
    }

    fn forward(&self, client: &AsyncClient, event: &Event) {
        let Some((topic, body)) = outbound_message(&self.config, event) else {
            return;
        };
        if let Err(e) = client.try_publish(topic.as_str(), QoS::AtLeastOnce, false, body) {
            warn!(%topic, "[cloud] Dropping outbound message: {}", e);
        }
    }
}

#[async_trait]
impl Service for CloudAdapter {
    fn name(&self) -> &'static str {
        ADAPTER
    }

    async fn setup(&mut self) -> ServiceResult<()> {
        self.outbound = Some(
            self.bus
                .subscribe_channel(&[self.topics.mode.clone(), self.topics.valve_command.clone()]),
        );
        info!(
            host = %self.config.host,
            port = self.config.port,
            topic = %self.config.level_topic,
            "[cloud] Adapter ready"
        );
        Ok(())
    }

    async fn run(&mut self) -> ServiceResult<()> {
        let mut outbound = self
            .outbound
            .take()
            .ok_or_else(|| ServiceError::setup(ADAPTER, "outbound subscription missing"))?;
        let (client, mut eventloop) = AsyncClient::new(self.options(), CLIENT_CAPACITY);

        loop {
            tokio::select! {
                polled = eventloop.poll() => match polled {
                    Ok(MqttEvent::Incoming(Packet::ConnAck(_))) => {
                        info!(host = %self.config.host, "[cloud] Connected to broker");
                        telemetry::set_connected(ADAPTER, true);
                        if let Err(e) = client.try_subscribe(self.config.level_topic.as_str(), QoS::AtLeastOnce) {
                            warn!("[cloud] Subscribe request failed: {}", e);
                        }
                    }
                    Ok(MqttEvent::Incoming(Packet::Publish(message))) => {
                        self.on_publish(&message.topic, &message.payload);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(host = %self.config.host, "[cloud] Broker connection error: {}", e);
                        telemetry::set_connected(ADAPTER, false);
                        telemetry::record_reconnect(ADAPTER);
                        sleep(self.config.reconnect_delay).await;
                    }
                },
                event = outbound.recv() => match event {
                    Some(event) => self.forward(&client, &event),
                    None => return Err(ServiceError::runtime(ADAPTER, AdapterError::Closed.to_string())),
                },
            }
        }
    }

    async fn cleanup(&mut self) {
        self.outbound = None;
        telemetry::set_connected(ADAPTER, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::Topic;
    use shared_types::{SystemState, ValveOpening};

    #[test]
    fn test_parse_object_payload() {
        let reading = parse_level_payload(br#"{"level": 0.27}"#).unwrap();
        assert_eq!(reading.water_level, 0.27);

        let reading =
            parse_level_payload(br#"{"level": 0.3, "timestamp": "2024-05-01T10:00:00Z"}"#)
                .unwrap();
        assert_eq!(reading.timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        let reading = parse_level_payload(br#"{"level": 0.3, "timestamp": 1714557600}"#).unwrap();
        assert_eq!(reading.timestamp.timestamp(), 1_714_557_600);
    }

    #[test]
    fn test_parse_bare_number() {
        let reading = parse_level_payload(b"42.5").unwrap();
        assert_eq!(reading.water_level, 42.5);
    }

    #[test]
    fn test_parse_rejects_bad_payloads() {
        assert!(matches!(
            parse_level_payload(b"high"),
            Err(AdapterError::Malformed(_))
        ));
        assert!(matches!(
            parse_level_payload(br#"{"value": 3}"#),
            Err(AdapterError::Malformed(_))
        ));
        assert!(matches!(
            parse_level_payload(br#"{"level": -1}"#),
            Err(AdapterError::Invalid(_))
        ));
    }

    #[test]
    fn test_outbound_messages() {
        let config = CloudConfig::default();
        let mode = Event::new(
            Topic::from_static("mode"),
            Payload::Mode {
                state: SystemState::Manual,
            },
        );
        let (topic, body) = outbound_message(&config, &mode).unwrap();
        assert_eq!(topic, config.mode_topic);
        assert_eq!(body, br#"{"mode":"MANUAL"}"#.to_vec());

        let valve = Event::new(
            Topic::from_static("cmd.valve"),
            Payload::ValveCommand {
                opening: ValveOpening::HALF,
            },
        );
        let (topic, body) = outbound_message(&config, &valve).unwrap();
        assert_eq!(topic, config.valve_topic);
        assert_eq!(body, br#"{"valve_opening":50.0}"#.to_vec());

        let other = Event::new(Topic::from_static("button.pressed"), Payload::ButtonPressed);
        assert!(outbound_message(&config, &other).is_none());
    }

    #[tokio::test]
    async fn test_level_messages_reach_the_bus() {
        let bus = Arc::new(InMemoryEventBus::new());
        let topics = TopicMap::default();
        let mut levels = bus.subscribe_channel(&[topics.sensor_level.clone()]);
        let adapter = CloudAdapter::new(CloudConfig::default(), Arc::clone(&bus), topics);

        adapter.on_publish("tank/level", br#"{"level": 0.4}"#);
        adapter.on_publish("tank/level", b"nonsense");
        adapter.on_publish("other/topic", b"0.9");

        let event = levels.try_recv().unwrap();
        assert!(matches!(event.payload, Payload::Level { level, .. } if level == 0.4));
        assert!(levels.try_recv().is_none());
    }
}
