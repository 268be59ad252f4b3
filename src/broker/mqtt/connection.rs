//! Pure session state and option handling for the MQTT transport

use crate::broker::BrokerError;
use crate::config::MqttSection;
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::{Event, MqttOptions};
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use url::Url;

/// Lifecycle of a single broker session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// CONNECT sent, waiting for ConnAck
    Connecting,
    /// ConnAck received, publishes allowed
    Connected,
    /// Session is dead; it is never revived
    Disconnected(String),
}

/// What the event loop poller observed
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ConnAckReceived,
    DisconnectedByBroker,
    NetworkError(String),
    /// PingResp, PubAck and other traffic that does not change state
    Infrastructure,
}

/// Classify an rumqttc event (pure function)
pub fn route_event(event: &Event) -> SessionEvent {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => SessionEvent::ConnAckReceived,
        Event::Incoming(Packet::Disconnect(_)) => SessionEvent::DisconnectedByBroker,
        _ => SessionEvent::Infrastructure,
    }
}

/// Build options for a brand new session (pure function)
pub fn configure_mqtt_options(
    client_id: &str,
    config: &MqttSection,
) -> Result<MqttOptions, BrokerError> {
    let url = Url::parse(&config.broker_url)
        .map_err(|_| BrokerError::InvalidBrokerUrl(config.broker_url.clone()))?;

    if !matches!(url.scheme(), "mqtt" | "mqtts" | "tcp") {
        return Err(BrokerError::InvalidBrokerUrl(config.broker_url.clone()));
    }

    let host = url
        .host_str()
        .ok_or_else(|| BrokerError::InvalidBrokerUrl(config.broker_url.clone()))?;
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

    let mut mqtt_options = MqttOptions::new(client_id, host, port);

    if url.scheme() == "mqtts" {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if !url.username().is_empty() {
        mqtt_options.set_credentials(url.username(), url.password().unwrap_or_default());
    }

    // No session state survives a reconnect
    mqtt_options.set_clean_start(true);
    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    Ok(mqtt_options)
}
