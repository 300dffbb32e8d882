//! # Hardware Adapter
//!
//! Line-delimited JSON link to the valve control node (button, potentiometer,
//! valve servo, LCD) over a serial device or a serial-over-TCP bridge.
//!
//! ## Inbound frames
//!
//! | Frame | Bus topic |
//! |-------|-----------|
//! | `{"event":"button_pressed"}` | `button.pressed` |
//! | `{"event":"pot_changed","value":42.0}` | `manual.valve_command` (if moved ≥ tolerance) |
//! | `{"event":"heartbeat", ...}` | none, logged |
//! | `{"level":0.27}` | `sensor.level` |
//!
//! ## Outbound frame
//!
//! Every `send_interval`: `{"mode":"MANUAL","valve_opening":35.0}`, built
//! from the latest `mode` and `cmd.valve` events.

use crate::adapters::{AdapterError, AdapterResult};
use crate::container::config::{HardwareConfig, HardwareEndpoint};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_bus::{
    EventPublisher, Handler, InMemoryEventBus, Payload, SubscriptionId, Topic, TopicMap,
};
use shared_types::{LevelReading, Service, ServiceResult, SystemState, ValveOpening};
use std::sync::Arc;
use tank_telemetry::metrics as telemetry;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const ADAPTER: &str = "hardware";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum NodeEvent {
    ButtonPressed,
    PotChanged {
        value: f64,
    },
    Heartbeat {
        #[serde(default)]
        mode: Option<String>,
        #[serde(default)]
        valve_pos: Option<f64>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFrame {
    Event(NodeEvent),
    Level { level: f64 },
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Button,
    Valve(ValveOpening),
    Level(LevelReading),
    Heartbeat {
        mode: Option<String>,
        valve_pos: Option<f64>,
    },
    /// Pot moved by less than the tolerance.
    Suppressed,
}

impl Inbound {
    fn kind(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Valve(_) => "pot",
            Self::Level(_) => "level",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Suppressed => "pot_suppressed",
        }
    }
}

/// Stateful decoder: remembers the last forwarded pot value.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    pot_tolerance: f64,
    last_pot: Option<f64>,
}

impl FrameCodec {
    pub fn new(pot_tolerance: f64) -> Self {
        Self {
            pot_tolerance,
            last_pot: None,
        }
    }

    pub fn decode(&mut self, line: &str) -> AdapterResult<Inbound> {
        let frame: RawFrame = serde_json::from_str(line.trim())
            .map_err(|e| AdapterError::Malformed(format!("{e}: {line:?}")))?;

        let inbound = match frame {
            RawFrame::Event(NodeEvent::ButtonPressed) => Inbound::Button,
            RawFrame::Event(NodeEvent::PotChanged { value }) => {
                let opening = ValveOpening::try_new(value)?;
                match self.last_pot {
                    Some(last) if (value - last).abs() < self.pot_tolerance => Inbound::Suppressed,
                    _ => {
                        self.last_pot = Some(value);
                        Inbound::Valve(opening)
                    }
                }
            }
            RawFrame::Event(NodeEvent::Heartbeat { mode, valve_pos }) => {
                Inbound::Heartbeat { mode, valve_pos }
            }
            RawFrame::Level { level } => Inbound::Level(LevelReading::validated(level, Utc::now())?),
        };
        Ok(inbound)
    }
}

/// State written to the node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StateFrame {
    pub mode: SystemState,
    pub valve_opening: f64,
}

impl Default for StateFrame {
    fn default() -> Self {
        Self {
            mode: SystemState::Unconnected,
            valve_opening: ValveOpening::CLOSED.percent(),
        }
    }
}

impl StateFrame {
    /// One JSON line, newline included.
    pub fn encode(&self) -> AdapterResult<String> {
        let mut line =
            serde_json::to_string(self).map_err(|e| AdapterError::Malformed(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }
}

/// Bidirectional byte stream to the node.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// One open link to the node, as independent read and write halves.
///
/// The halves never share an in-flight operation, so a write is never
/// queued behind a read that is waiting on the device.
pub struct Link {
    reader: Box<dyn AsyncRead + Unpin + Send>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
}

impl Link {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Split a stream whose halves can run concurrently (sockets, pipes).
    pub fn from_stream<T: Transport + 'static>(stream: T) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer)
    }
}

pub struct HardwareAdapter {
    config: HardwareConfig,
    bus: Arc<InMemoryEventBus>,
    topics: TopicMap,
    codec: FrameCodec,
    state: Arc<Mutex<StateFrame>>,
    subscriptions: Vec<(Topic, SubscriptionId)>,
}

impl HardwareAdapter {
    pub fn new(config: HardwareConfig, bus: Arc<InMemoryEventBus>, topics: TopicMap) -> Self {
        let codec = FrameCodec::new(config.pot_tolerance);
        Self {
            config,
            bus,
            topics,
            codec,
            state: Arc::new(Mutex::new(StateFrame::default())),
            subscriptions: Vec::new(),
        }
    }

    /// Latest state that will be written to the node.
    pub fn state_frame(&self) -> StateFrame {
        *self.state.lock()
    }

    fn track_outputs(&mut self) {
        let state = Arc::clone(&self.state);
        let mode_id = self.bus.subscribe(
            &self.topics.mode,
            Handler::inline(move |event| {
                if let Payload::Mode { state: mode } = event.payload {
                    state.lock().mode = mode;
                }
                Ok(())
            }),
        );

        let state = Arc::clone(&self.state);
        let valve_id = self.bus.subscribe(
            &self.topics.valve_command,
            Handler::inline(move |event| {
                if let Payload::ValveCommand { opening } = event.payload {
                    state.lock().valve_opening = opening.percent();
                }
                Ok(())
            }),
        );

        self.subscriptions = vec![
            (self.topics.mode.clone(), mode_id),
            (self.topics.valve_command.clone(), valve_id),
        ];
    }

    async fn connect(&self) -> AdapterResult<Link> {
        match &self.config.endpoint {
            HardwareEndpoint::Device(path) => {
                // A tokio `File` runs one blocking operation at a time, so the
                // writer gets its own handle on the same descriptor.
                let reader = tokio::fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .await?;
                let writer = reader.try_clone().await?;
                Ok(Link::new(reader, writer))
            }
            HardwareEndpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr).await?;
                stream.set_nodelay(true)?;
                let (reader, writer) = stream.into_split();
                Ok(Link::new(reader, writer))
            }
        }
    }

    /// Exchange frames over one open link until it fails or closes.
    pub async fn serve(&mut self, link: Link) -> AdapterResult<()> {
        let Link { reader, mut writer } = link;
        let mut lines = BufReader::new(reader).lines();
        let first_send = Instant::now() + self.config.send_interval;
        let mut ticker = interval_at(first_send, self.config.send_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.on_line(&line),
                    None => return Err(AdapterError::Closed),
                },
                _ = ticker.tick() => {
                    let frame = self.state_frame().encode()?;
                    writer.write_all(frame.as_bytes()).await?;
                    writer.flush().await?;
                }
            }
        }
    }

    fn on_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        let inbound = match self.codec.decode(line) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("[hardware] Skipping frame: {}", e);
                telemetry::record_rejected(ADAPTER, e.reason());
                return;
            }
        };
        telemetry::record_frame(ADAPTER, inbound.kind());

        match inbound {
            Inbound::Button => {
                info!("[hardware] Button pressed");
                self.bus
                    .publish(&self.topics.button_pressed, Payload::ButtonPressed);
            }
            Inbound::Valve(opening) => {
                info!("[hardware] Pot moved to {}", opening);
                self.bus.publish(
                    &self.topics.manual_valve_command,
                    Payload::ManualValve { opening },
                );
            }
            Inbound::Level(reading) => {
                self.bus
                    .publish(&self.topics.sensor_level, Payload::level(reading));
            }
            Inbound::Heartbeat { mode, valve_pos } => {
                debug!(?mode, ?valve_pos, "[hardware] Heartbeat");
            }
            Inbound::Suppressed => {
                debug!("[hardware] Pot change below tolerance");
            }
        }
    }
}

#[async_trait]
impl Service for HardwareAdapter {
    fn name(&self) -> &'static str {
        ADAPTER
    }

    async fn setup(&mut self) -> ServiceResult<()> {
        self.track_outputs();
        info!(endpoint = %self.config.endpoint, "[hardware] Adapter ready");
        Ok(())
    }

    async fn run(&mut self) -> ServiceResult<()> {
        loop {
            match self.connect().await {
                Ok(link) => {
                    info!(endpoint = %self.config.endpoint, "[hardware] Link open");
                    telemetry::set_connected(ADAPTER, true);
                    if let Err(e) = self.serve(link).await {
                        warn!("[hardware] Link lost: {}", e);
                    }
                    telemetry::set_connected(ADAPTER, false);
                }
                Err(e) => {
                    warn!(endpoint = %self.config.endpoint, "[hardware] Cannot open link: {}", e);
                }
            }
            telemetry::record_reconnect(ADAPTER);
            sleep(self.config.reconnect_delay).await;
        }
    }

    async fn cleanup(&mut self) {
        for (topic, id) in self.subscriptions.drain(..) {
            self.bus.unsubscribe(&topic, id);
        }
        telemetry::set_connected(ADAPTER, false);
    }
}
