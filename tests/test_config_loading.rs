//! Configuration loading and validation tests
//!
//! Tests focus on observable outcomes of loading a config file from disk.

use envmon::config::{ConfigError, MonitorConfig};
use envmon::protocol::TopicSet;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
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
broker_url = "mqtt://192.168.1.100:1883"
"#,
    );

    let config = MonitorConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.device.id, "pico-scd40");
    assert_eq!(config.wifi.networks.len(), 2);
    assert_eq!(config.wifi.networks[1].ssid, "backup");
    assert_eq!(config.wifi.probe_addr, "192.168.1.1:53");
    assert_eq!(config.mqtt.broker_url, "mqtt://192.168.1.100:1883");

    let topics = TopicSet::from_config(&config.mqtt).unwrap();
    assert_eq!(topics, TopicSet::default());
    assert_eq!(config.timing().reconnect_timeout, Duration::from_secs(10));
}

#[test]
fn test_topics_are_canonicalized() {
    let temp_file = write_config(
        r#"
[device]
id = "pico"

[wifi]
probe_addr = "192.168.1.1:53"

[[wifi.networks]]
ssid = "home"
password = "pw1"

[mqtt]
broker_url = "mqtt://localhost:1883"
telemetry_topic = "/lab//scd40/"
events_topic = "lab/scd40/events/"
"#,
    );

    let config = MonitorConfig::load_from_file(temp_file.path()).unwrap();
    let topics = TopicSet::from_config(&config.mqtt).unwrap();

    assert_eq!(topics.telemetry, "lab/scd40");
    assert_eq!(topics.events, "lab/scd40/events");
}

#[test]
fn test_missing_file_is_read_error() {
    let result = MonitorConfig::load_from_file(std::path::Path::new("/nonexistent/envmon.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let temp_file = write_config("[device\nid = ");
    let result = MonitorConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_missing_mqtt_section_is_rejected() {
    let temp_file = write_config(
        r#"
[device]
id = "pico"

[wifi]
probe_addr = "192.168.1.1:53"

[[wifi.networks]]
ssid = "home"
password = "pw1"
"#,
    );
    assert!(MonitorConfig::load_from_file(temp_file.path()).is_err());
}

#[test]
fn test_probe_addr_without_port_is_rejected() {
    let temp_file = write_config(
        r#"
[device]
id = "pico"

[wifi]
probe_addr = "192.168.1.1"

[[wifi.networks]]
ssid = "home"
password = "pw1"

[mqtt]
broker_url = "mqtt://localhost:1883"
"#,
    );

    match MonitorConfig::load_from_file(temp_file.path()) {
        Err(ConfigError::InvalidConfig(message)) => assert!(message.contains("probe_addr")),
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn test_zero_timing_is_rejected() {
    let temp_file = write_config(
        r#"
[device]
id = "pico"

[wifi]
probe_addr = "192.168.1.1:53"

[[wifi.networks]]
ssid = "home"
password = "pw1"

[mqtt]
broker_url = "mqtt://localhost:1883"

[timing]
reconnect_timeout_secs = 0
"#,
    );

    match MonitorConfig::load_from_file(temp_file.path()) {
        Err(ConfigError::InvalidConfig(message)) => {
            assert!(message.contains("reconnect_timeout_secs"));
        }
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn test_redacted_config_hides_passwords() {
    let temp_file = write_config(
        r#"
[device]
id = "pico"

[wifi]
probe_addr = "192.168.1.1:53"

[[wifi.networks]]
ssid = "home"
password = "hunter2"

[mqtt]
broker_url = "mqtt://localhost:1883"
"#,
    );

    let config = MonitorConfig::load_from_file(temp_file.path()).unwrap();
    let shown = toml::to_string_pretty(&config.redacted()).unwrap();

    assert!(shown.contains("home"));
    assert!(!shown.contains("hunter2"));
    assert!(!format!("{config:?}").contains("hunter2"));
}
