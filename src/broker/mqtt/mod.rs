//! MQTT broker transport over rumqttc
//!
//! Split the same way as the rest of the crate: pure decisions in
//! [`connection`] and [`health_monitor`], I/O in [`client`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use envmon::broker::{BrokerTransport, MqttBroker};
//! use envmon::config::MqttSection;
//!
//! # async fn demo() -> Result<(), envmon::broker::BrokerError> {
//! let config = MqttSection {
//!     broker_url: "mqtt://localhost:1883".to_string(),
//!     telemetry_topic: "sensors/scd40".to_string(),
//!     events_topic: "sensors/scd40/events".to_string(),
//!     keep_alive_secs: 60,
//!     connect_timeout_secs: 10,
//! };
//!
//! let mut broker = MqttBroker::new("node-1", config)?;
//! let session = broker.connect().await?;
//! broker.publish(&session, "sensors/scd40", "{}".into()).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod health_monitor;

pub use client::{MqttBroker, MqttSession};
pub use connection::{configure_mqtt_options, SessionEvent, SessionState};
pub use health_monitor::HealthMonitor;
