//! Subscriber setup.
//!
//! One `tracing-subscriber` registry with an `EnvFilter` and either a JSON or
//! a plain `fmt` layer. Log lines from each component carry a bracketed
//! prefix (`[controller]`, `[hardware]`, `[cloud]`, `[dashboard]`).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

pub(crate) fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = build_filter(&config.log_level)?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(config.with_target)
            .with_thread_ids(true)
            .with_current_span(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::Subscriber(e.to_string()))
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(config.with_target);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::Subscriber(e.to_string()))
    }
}

/// `RUST_LOG` wins over the configured level when both are set.
fn build_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| TelemetryError::Config(format!("invalid log filter {level:?}: {e}")))
}
