//! Prometheus metrics for the control unit.
//!
//! All metrics follow the naming convention: `tank_<component>_<metric>_<unit>`
//!
//! Controller metrics live in `tank-controller` behind its `metrics` feature
//! and register with the default registry; [`gather_metrics`] gathers both.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, GaugeVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // EVENT BUS
    // =========================================================================

    /// Handler failures reported by the bus (copied from its counters)
    pub static ref BUS_HANDLER_FAILURES: IntGauge = IntGauge::new(
        "tank_bus_handler_failures",
        "Handler failures and panics isolated by the bus"
    ).expect("metric creation failed");

    /// Events published, by topic
    pub static ref BUS_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("tank_bus_events_total", "Events published on the bus"),
        &["topic"]
    ).expect("metric creation failed");

    // =========================================================================
    // ADAPTERS
    // =========================================================================

    /// Inbound frames accepted, by adapter and frame kind
    pub static ref ADAPTER_FRAMES: IntCounterVec = IntCounterVec::new(
        Opts::new("tank_adapter_frames_total", "Inbound frames accepted"),
        &["adapter", "kind"]
    ).expect("metric creation failed");

    /// Inbound frames rejected, by adapter and reason
    pub static ref ADAPTER_REJECTS: IntCounterVec = IntCounterVec::new(
        Opts::new("tank_adapter_rejected_total", "Inbound frames rejected"),
        &["adapter", "reason"]
    ).expect("metric creation failed");

    /// Link state per adapter (0=down, 1=up)
    pub static ref ADAPTER_CONNECTED: GaugeVec = GaugeVec::new(
        Opts::new("tank_adapter_connected", "Whether the adapter link is up"),
        &["adapter"]
    ).expect("metric creation failed");

    /// Reconnect attempts per adapter
    pub static ref ADAPTER_RECONNECTS: IntCounterVec = IntCounterVec::new(
        Opts::new("tank_adapter_reconnects_total", "Reconnect attempts"),
        &["adapter"]
    ).expect("metric creation failed");

    // =========================================================================
    // DASHBOARD
    // =========================================================================

    /// HTTP requests, by route and status code
    pub static ref HTTP_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("tank_http_requests_total", "Dashboard HTTP requests"),
        &["route", "status"]
    ).expect("metric creation failed");

    /// Services currently running
    pub static ref SERVICES_RUNNING: IntGauge = IntGauge::new(
        "tank_services_running",
        "Number of services in the RUNNING state"
    ).expect("metric creation failed");
}

/// Handle proving the metrics were registered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    _private: (),
}

/// Register all metrics with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BUS_EVENTS.clone()),
        Box::new(BUS_HANDLER_FAILURES.clone()),
        Box::new(ADAPTER_FRAMES.clone()),
        Box::new(ADAPTER_REJECTS.clone()),
        Box::new(ADAPTER_CONNECTED.clone()),
        Box::new(ADAPTER_RECONNECTS.clone()),
        Box::new(HTTP_REQUESTS.clone()),
        Box::new(SERVICES_RUNNING.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _private: () })
}

/// Encode [`REGISTRY`] and the default registry as Prometheus text.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let mut metric_families = REGISTRY.gather();
    metric_families.extend(prometheus::gather());
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

pub fn record_bus_event(topic: &str) {
    BUS_EVENTS.with_label_values(&[topic]).inc();
}

pub fn set_bus_handler_failures(failures: u64) {
    BUS_HANDLER_FAILURES.set(i64::try_from(failures).unwrap_or(i64::MAX));
}

pub fn record_frame(adapter: &str, kind: &str) {
    ADAPTER_FRAMES.with_label_values(&[adapter, kind]).inc();
}

pub fn record_rejected(adapter: &str, reason: &str) {
    ADAPTER_REJECTS.with_label_values(&[adapter, reason]).inc();
}

pub fn set_connected(adapter: &str, connected: bool) {
    ADAPTER_CONNECTED
        .with_label_values(&[adapter])
        .set(if connected { 1.0 } else { 0.0 });
}

pub fn record_reconnect(adapter: &str) {
    ADAPTER_RECONNECTS.with_label_values(&[adapter]).inc();
}

pub fn record_http_request(route: &str, status: u16) {
    HTTP_REQUESTS
        .with_label_values(&[route, &status.to_string()])
        .inc();
}
