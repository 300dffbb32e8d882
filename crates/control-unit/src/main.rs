//! Tank control unit entry point.

use anyhow::{Context, Result};
use control_unit::{load_config, ServiceContainer};
use tank_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .context("failed to initialize telemetry")?;

    let config = load_config();
    config.validate().context("invalid configuration")?;
    info!(
        l1 = config.thresholds.l1,
        l2 = config.thresholds.l2,
        hardware = config.hardware.enabled,
        cloud = config.cloud.enabled,
        dashboard = config.dashboard.enabled,
        "Configuration loaded"
    );

    let mut container = ServiceContainer::build(&config)?;
    container
        .start()
        .await
        .context("failed to start services")?;

    info!("Control unit running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    container.stop().await;

    Ok(())
}
