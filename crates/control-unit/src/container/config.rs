//! # Control Unit Configuration
//!
//! One configuration value for the whole process. Loaded once at startup,
//! read-only afterwards.
//!
//! ## Environment Overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `TANK_L1`, `TANK_L2` | level thresholds |
//! | `TANK_T1_SECS`, `TANK_T2_SECS` | dwell / silence timeouts |
//! | `TANK_HISTORY_CAPACITY` | retained readings |
//! | `TANK_SERIAL_PATH` | device path or `tcp://host:port` |
//! | `TANK_SEND_INTERVAL_MS`, `TANK_POT_TOLERANCE` | hardware link |
//! | `TANK_MQTT_HOST`, `TANK_MQTT_PORT`, `TANK_MQTT_CLIENT_ID` | broker |
//! | `TANK_HTTP_ADDR`, `TANK_API_PREFIX`, `TANK_CORS_ORIGINS` | dashboard |
//! | `TANK_DISABLE_HARDWARE`, `TANK_DISABLE_CLOUD`, `TANK_DISABLE_DASHBOARD` | adapter switches |
//!
//! Values that fail to parse are logged and ignored.

use shared_bus::TopicMap;
use shared_types::{Thresholds, ValidationError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tank_controller::ControllerConfig;
use thiserror::Error;
use tracing::{info, warn};

/// Complete control unit configuration.
#[derive(Debug, Clone, Default)]
pub struct ControlUnitConfig {
    pub thresholds: ThresholdConfig,
    pub hardware: HardwareConfig,
    pub cloud: CloudConfig,
    pub dashboard: DashboardConfig,
    pub topics: TopicMap,
}

impl ControlUnitConfig {
    /// Check every section. Any violation aborts startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.to_thresholds()?;
        if self.thresholds.history_capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        if self.thresholds.watchdog_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("watchdog_interval"));
        }
        if self.hardware.send_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("send_interval"));
        }
        if !self.hardware.pot_tolerance.is_finite() || self.hardware.pot_tolerance < 0.0 {
            return Err(ConfigError::InvalidPotTolerance(self.hardware.pot_tolerance));
        }
        let prefix = &self.dashboard.api_prefix;
        if !prefix.is_empty() && (!prefix.starts_with('/') || prefix.ends_with('/')) {
            return Err(ConfigError::InvalidApiPrefix(prefix.clone()));
        }
        if self.dashboard.readings_limit == 0 {
            return Err(ConfigError::ZeroReadingsLimit);
        }
        Ok(())
    }

    /// Controller settings derived from this configuration.
    pub fn controller_config(&self) -> Result<ControllerConfig, ConfigError> {
        Ok(ControllerConfig {
            thresholds: self.thresholds.to_thresholds()?,
            history_capacity: self.thresholds.history_capacity,
            watchdog_interval: self.thresholds.watchdog_interval,
            topics: self.topics.clone(),
        })
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid thresholds: {0}")]
    InvalidThresholds(#[from] ValidationError),

    #[error("history capacity must be greater than zero")]
    ZeroHistoryCapacity,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("pot tolerance must be a non-negative number, got {0}")]
    InvalidPotTolerance(f64),

    #[error("API prefix must start with '/' and not end with one, got {0:?}")]
    InvalidApiPrefix(String),

    #[error("readings limit must be greater than zero")]
    ZeroReadingsLimit,
}

/// Level thresholds and controller timing.
#[derive(Debug, Clone)]
pub struct ThresholdConfig {
    /// Pre-alarm level
    pub l1: f64,
    /// Alarm level
    pub l2: f64,
    /// Dwell above L1 before PRE_ALARM
    pub t1: Duration,
    /// Sensor silence before UNCONNECTED
    pub t2: Duration,
    pub history_capacity: usize,
    pub watchdog_interval: Duration,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            l1: 0.30,
            l2: 0.50,
            t1: Duration::from_secs(5),
            t2: Duration::from_secs(10),
            history_capacity: 100,
            watchdog_interval: Duration::from_secs(1),
        }
    }
}

impl ThresholdConfig {
    pub fn to_thresholds(&self) -> Result<Thresholds, ConfigError> {
        Ok(Thresholds::new(self.l1, self.l2, self.t1, self.t2)?)
    }
}

/// Where the serial node is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareEndpoint {
    /// Character device such as `/dev/ttyACM0`, already configured for the
    /// right baud rate.
    Device(PathBuf),
    /// Serial-over-TCP bridge, written `tcp://host:port`.
    Tcp(String),
}

impl FromStr for HardwareEndpoint {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.strip_prefix("tcp://") {
            Some(addr) => Self::Tcp(addr.to_string()),
            None => Self::Device(PathBuf::from(s)),
        })
    }
}

impl std::fmt::Display for HardwareEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device(path) => write!(f, "{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// Serial node link.
#[derive(Debug, Clone)]
pub struct HardwareConfig {
    pub enabled: bool,
    pub endpoint: HardwareEndpoint,
    /// How often the current mode and valve opening are written to the node
    pub send_interval: Duration,
    /// Minimum pot change (percentage points) forwarded as a valve command
    pub pot_tolerance: f64,
    pub reconnect_delay: Duration,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: HardwareEndpoint::Device(PathBuf::from("/dev/ttyACM0")),
            send_interval: Duration::from_millis(500),
            pot_tolerance: 1.0,
            reconnect_delay: Duration::from_secs(2),
        }
    }
}

/// MQTT broker link.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Prefix of the client id; a random suffix is appended at each start
    pub client_id: String,
    pub level_topic: String,
    pub mode_topic: String,
    pub valve_topic: String,
    pub keep_alive: Duration,
    pub reconnect_delay: Duration,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "broker.mqtt-dashboard.com".to_string(),
            port: 1883,
            client_id: "tank-control-unit".to_string(),
            level_topic: "tank/level".to_string(),
            mode_topic: "tank/mode".to_string(),
            valve_topic: "tank/valve".to_string(),
            keep_alive: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// HTTP dashboard.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub bind_addr: SocketAddr,
    /// Prefix for every API route, empty or `/segment`
    pub api_prefix: String,
    /// Readings returned when the request does not set `limit`
    pub readings_limit: usize,
    /// Allowed CORS origins, `*` for any
    pub cors_origins: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            api_prefix: "/api".to_string(),
            readings_limit: 60,
            cors_origins: vec![
                "http://127.0.0.1:8080".to_string(),
                "http://localhost:8080".to_string(),
            ],
        }
    }
}

/// Load configuration from defaults and `TANK_*` environment variables.
pub fn load_config() -> ControlUnitConfig {
    apply_overrides(ControlUnitConfig::default(), |key| std::env::var(key).ok())
}

/// Apply overrides from any key lookup.
pub fn apply_overrides<F>(mut config: ControlUnitConfig, lookup: F) -> ControlUnitConfig
where
    F: Fn(&str) -> Option<String>,
{
    let parsed = |key: &str| -> Option<f64> { parse_var(&lookup, key) };

    if let Some(l1) = parsed("TANK_L1") {
        config.thresholds.l1 = l1;
    }
    if let Some(l2) = parsed("TANK_L2") {
        config.thresholds.l2 = l2;
    }
    if let Some(t1) = parsed("TANK_T1_SECS").and_then(secs) {
        config.thresholds.t1 = t1;
    }
    if let Some(t2) = parsed("TANK_T2_SECS").and_then(secs) {
        config.thresholds.t2 = t2;
    }
    if let Some(capacity) = parse_var(&lookup, "TANK_HISTORY_CAPACITY") {
        config.thresholds.history_capacity = capacity;
    }

    if let Some(endpoint) = parse_var(&lookup, "TANK_SERIAL_PATH") {
        config.hardware.endpoint = endpoint;
    }
    if let Some(ms) = parse_var::<u64, _>(&lookup, "TANK_SEND_INTERVAL_MS") {
        config.hardware.send_interval = Duration::from_millis(ms);
    }
    if let Some(tolerance) = parsed("TANK_POT_TOLERANCE") {
        config.hardware.pot_tolerance = tolerance;
    }

    if let Some(host) = lookup("TANK_MQTT_HOST") {
        config.cloud.host = host;
    }
    if let Some(port) = parse_var(&lookup, "TANK_MQTT_PORT") {
        config.cloud.port = port;
    }
    if let Some(client_id) = lookup("TANK_MQTT_CLIENT_ID") {
        config.cloud.client_id = client_id;
    }

    if let Some(addr) = parse_var(&lookup, "TANK_HTTP_ADDR") {
        config.dashboard.bind_addr = addr;
    }
    if let Some(prefix) = lookup("TANK_API_PREFIX") {
        config.dashboard.api_prefix = prefix;
    }
    if let Some(origins) = lookup("TANK_CORS_ORIGINS") {
        config.dashboard.cors_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }

    if flag(&lookup, "TANK_DISABLE_HARDWARE") {
        config.hardware.enabled = false;
        info!("Hardware adapter disabled by environment");
    }
    if flag(&lookup, "TANK_DISABLE_CLOUD") {
        config.cloud.enabled = false;
        info!("Cloud adapter disabled by environment");
    }
    if flag(&lookup, "TANK_DISABLE_DASHBOARD") {
        config.dashboard.enabled = false;
        info!("Dashboard adapter disabled by environment");
    }

    config
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

fn secs(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}

fn flag<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> bool {
    lookup(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_env(vars: &[(&str, &str)]) -> ControlUnitConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        apply_overrides(ControlUnitConfig::default(), |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ControlUnitConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds.l1, 0.30);
        assert_eq!(config.cloud.port, 1883);
        assert_eq!(config.dashboard.api_prefix, "/api");
        assert_eq!(
            config.hardware.endpoint,
            HardwareEndpoint::Device(PathBuf::from("/dev/ttyACM0"))
        );
    }

    #[test]
    fn test_overrides_applied() {
        let config = with_env(&[
            ("TANK_L1", "0.4"),
            ("TANK_L2", "0.9"),
            ("TANK_T1_SECS", "2.5"),
            ("TANK_SERIAL_PATH", "tcp://10.0.0.2:4000"),
            ("TANK_MQTT_PORT", "8883"),
            ("TANK_HTTP_ADDR", "0.0.0.0:9000"),
            ("TANK_CORS_ORIGINS", "http://a.local, http://b.local"),
            ("TANK_DISABLE_CLOUD", "true"),
        ]);
        assert_eq!(config.thresholds.l1, 0.4);
        assert_eq!(config.thresholds.l2, 0.9);
        assert_eq!(config.thresholds.t1, Duration::from_millis(2500));
        assert_eq!(
            config.hardware.endpoint,
            HardwareEndpoint::Tcp("10.0.0.2:4000".to_string())
        );
        assert_eq!(config.cloud.port, 8883);
        assert!(!config.cloud.enabled);
        assert!(config.hardware.enabled);
        assert_eq!(config.dashboard.bind_addr.port(), 9000);
        assert_eq!(config.dashboard.cors_origins.len(), 2);
    }

    #[test]
    fn test_unparsable_override_ignored() {
        let config = with_env(&[("TANK_MQTT_PORT", "not-a-port"), ("TANK_T2_SECS", "-3")]);
        assert_eq!(config.cloud.port, 1883);
        assert_eq!(config.thresholds.t2, Duration::from_secs(10));
    }

    #[test]
    fn test_inverted_levels_rejected() {
        let config = with_env(&[("TANK_L1", "0.8"), ("TANK_L2", "0.5")]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThresholds(_))
        ));
        assert!(config.controller_config().is_err());
    }

    #[test]
    fn test_section_validation() {
        let mut config = ControlUnitConfig::default();
        config.dashboard.api_prefix = "api/".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidApiPrefix(_))
        ));

        let mut config = ControlUnitConfig::default();
        config.hardware.pot_tolerance = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPotTolerance(_))
        ));

        let mut config = ControlUnitConfig::default();
        config.thresholds.history_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroHistoryCapacity)
        ));
    }
}
