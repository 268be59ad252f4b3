//! Monitor configuration
//!
//! Loads the node's TOML configuration: device identity, the ordered list of
//! known wireless networks, the broker endpoint and topics, and the timing
//! constants the supervisor runs on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main monitor configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    pub device: DeviceSection,
    pub wifi: WifiSection,
    pub mqtt: MqttSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub sensor: SensorSection,
}

/// Device section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Device identifier, also used as MQTT client id (must match [a-zA-Z0-9._-]+)
    pub id: String,
    /// Append-only diagnostic log file
    #[serde(default = "default_event_log_path")]
    pub event_log_path: PathBuf,
}

fn default_event_log_path() -> PathBuf {
    PathBuf::from("error.log")
}

/// Known wireless networks, tried in order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WifiSection {
    /// `host:port` that answers whenever the local network is up, normally
    /// the gateway. Never the broker: a broker outage is not a link outage.
    pub probe_addr: String,
    pub networks: Vec<KnownNetwork>,
}

/// A single {identifier, credential} pair
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnownNetwork {
    pub ssid: String,
    pub password: String,
}

impl KnownNetwork {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    /// Copy with the credential replaced by a mask, for display
    pub fn masked(&self) -> Self {
        Self {
            ssid: self.ssid.clone(),
            password: "***".to_string(),
        }
    }
}

impl fmt::Debug for KnownNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnownNetwork")
            .field("ssid", &self.ssid)
            .field("password", &"***")
            .finish()
    }
}

/// MQTT section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL with protocol and port, e.g. `mqtt://192.168.1.100:1883`
    pub broker_url: String,
    /// Topic for periodic measurements
    #[serde(default = "default_telemetry_topic")]
    pub telemetry_topic: String,
    /// Topic for out-of-band status events
    #[serde(default = "default_events_topic")]
    pub events_topic: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// How long a fresh session may take to be acknowledged
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_telemetry_topic() -> String {
    "sensors/scd40".to_string()
}

fn default_events_topic() -> String {
    "sensors/scd40/events".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

/// Timing constants for polling, recovery and the indicator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingSection {
    pub poll_interval_ms: u64,
    pub initial_connect_timeout_secs: u64,
    pub reconnect_timeout_secs: u64,
    pub error_display_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub heartbeat_pulses: u32,
    pub startup_display_secs: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            initial_connect_timeout_secs: 15,
            reconnect_timeout_secs: 10,
            error_display_secs: 5,
            heartbeat_interval_secs: 10,
            heartbeat_pulses: 6,
            startup_display_secs: 5,
        }
    }
}

impl TimingSection {
    pub fn to_timing(&self) -> Timing {
        Timing {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            initial_connect_timeout: Duration::from_secs(self.initial_connect_timeout_secs),
            reconnect_timeout: Duration::from_secs(self.reconnect_timeout_secs),
            error_display: Duration::from_secs(self.error_display_secs),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            heartbeat_pulses: self.heartbeat_pulses,
            startup_display: Duration::from_secs(self.startup_display_secs),
        }
    }
}

/// Resolved timing used at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub poll_interval: Duration,
    pub initial_connect_timeout: Duration,
    pub reconnect_timeout: Duration,
    pub error_display: Duration,
    pub heartbeat_interval: Duration,
    pub heartbeat_pulses: u32,
    pub startup_display: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        TimingSection::default().to_timing()
    }
}

/// Sensor section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SensorSection {
    /// Native measurement interval of the sensor
    pub measurement_interval_secs: u64,
    /// Warm-up before the first sample is ready (simulated sensor only)
    pub warmup_secs: u64,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            measurement_interval_secs: 5,
            warmup_secs: 5,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid device ID format: {0}")]
    InvalidDeviceId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MonitorConfig {
    /// Load configuration from TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_id(&self.device.id)?;

        if self.wifi.networks.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "at least one [[wifi.networks]] entry is required".to_string(),
            ));
        }
        validate_probe_addr(&self.wifi.probe_addr)?;
        if let Some(pos) = self.wifi.networks.iter().position(|n| n.ssid.is_empty()) {
            return Err(ConfigError::InvalidConfig(format!(
                "wifi network #{} has an empty ssid",
                pos + 1
            )));
        }

        let timing = &self.timing;
        let zero_fields = [
            ("poll_interval_ms", timing.poll_interval_ms),
            (
                "initial_connect_timeout_secs",
                timing.initial_connect_timeout_secs,
            ),
            ("reconnect_timeout_secs", timing.reconnect_timeout_secs),
            ("error_display_secs", timing.error_display_secs),
            ("heartbeat_interval_secs", timing.heartbeat_interval_secs),
            ("heartbeat_pulses", u64::from(timing.heartbeat_pulses)),
        ];
        for (name, value) in zero_fields {
            if value == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "timing.{name} must be greater than 0"
                )));
            }
        }

        if self.sensor.measurement_interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "sensor.measurement_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn timing(&self) -> Timing {
        self.timing.to_timing()
    }

    /// Copy safe to print: every credential is masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.wifi.networks = self.wifi.networks.iter().map(KnownNetwork::masked).collect();
        copy
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[device]
id = "pico-scd40"

[wifi]
probe_addr = "192.168.1.1:53"

[[wifi.networks]]
ssid = "home"
password = "pw1"

[[wifi.networks]]
ssid = "backup"
password = "pw2"

[mqtt]
broker_url = "mqtt://localhost:1883"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate the link probe endpoint: a host and an explicit port
fn validate_probe_addr(probe_addr: &str) -> Result<(), ConfigError> {
    let invalid = || {
        ConfigError::InvalidConfig(format!(
            "wifi.probe_addr '{probe_addr}' must be host:port"
        ))
    };
    let url = url::Url::parse(&format!("tcp://{probe_addr}")).map_err(|_| invalid())?;
    let has_host = url.host_str().is_some_and(|host| !host.is_empty());
    if !has_host || url.port().is_none() || !url.path().is_empty() {
        return Err(invalid());
    }
    Ok(())
}

/// Validate device ID format (used verbatim as the MQTT client id)
fn validate_device_id(device_id: &str) -> Result<(), ConfigError> {
    let valid_chars = device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if device_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidDeviceId(format!(
            "Device ID '{device_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
