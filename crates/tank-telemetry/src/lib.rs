//! # Tank Telemetry
//!
//! Logging and metrics for the tank control unit.
//!
//! ## Components
//!
//! - **Logs**: `tracing` events through a `tracing-subscriber` registry,
//!   plain text for development and JSON lines for log shippers
//! - **Metrics**: Prometheus counters and gauges, exposed as text by
//!   [`gather_metrics`] for the dashboard's `/metrics` route
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tank_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TANK_LOG_LEVEL` | `info` | Log filter, `RUST_LOG` also honoured |
//! | `TANK_JSON_LOGS` | `false` | JSON output |
//! | `TANK_LOG_TARGET` | `true` | Module targets in log lines |
//! | `TANK_SERVICE_NAME` | `tank-control-unit` | Name in the startup line |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use metrics::{gather_metrics, register_metrics, MetricsHandle, REGISTRY};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install the global subscriber and register metrics.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    logging::init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        json = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name,
        _metrics: metrics,
    })
}

/// Guard held for the lifetime of the process.
pub struct TelemetryGuard {
    service_name: String,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
