//! Broker session supervision
//!
//! A session is opened fresh on every connect and never resumed. Neither
//! connect nor publish retries internally; retry policy belongs to the
//! recovery state machine.

pub mod mqtt;

pub use mqtt::{MqttBroker, MqttSession};

use crate::event_log::EventLog;
use crate::link::{LinkSupervisor, WifiDriver};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Broker failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BrokerError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),
    #[error("Publish failed: {0}")]
    PublishFailed(String),
    #[error("Session is not connected")]
    NotConnected,
    #[error("Network link is down")]
    LinkUnavailable,
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for BrokerError {
    fn from(error: serde_json::Error) -> Self {
        BrokerError::Serialization(error.to_string())
    }
}

/// Protocol-level broker client
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Handle for one broker session
    type Session: Send + Sync;

    /// Open a brand new session
    async fn connect(&mut self) -> Result<Self::Session, BrokerError>;

    /// Single publish attempt on `session`. A stale session must fail.
    async fn publish(
        &self,
        session: &Self::Session,
        topic: &str,
        payload: Bytes,
    ) -> Result<(), BrokerError>;
}

/// Owns the broker transport and reports its failures
pub struct BrokerSupervisor<B: BrokerTransport> {
    transport: B,
    event_log: Arc<dyn EventLog>,
}

impl<B: BrokerTransport> BrokerSupervisor<B> {
    pub fn new(transport: B, event_log: Arc<dyn EventLog>) -> Self {
        Self {
            transport,
            event_log,
        }
    }

    pub fn transport(&self) -> &B {
        &self.transport
    }

    /// Open a fresh session. Refuses to try while the link is down.
    pub async fn connect<D: WifiDriver>(
        &mut self,
        link: &LinkSupervisor<D>,
    ) -> Result<B::Session, BrokerError> {
        if !link.is_connected().await {
            debug!("Skipping broker connect: link is down");
            return Err(BrokerError::LinkUnavailable);
        }

        match self.transport.connect().await {
            Ok(session) => {
                info!("MQTT session established");
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "MQTT connect failed");
                self.event_log
                    .append(&format!("MQTT connection failed: {e}"));
                Err(e)
            }
        }
    }

    /// Single publish attempt
    pub async fn publish(
        &self,
        session: &B::Session,
        topic: &str,
        payload: Bytes,
    ) -> Result<(), BrokerError> {
        match self.transport.publish(session, topic, payload).await {
            Ok(()) => {
                debug!(topic = %topic, "Published");
                Ok(())
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "MQTT publish failed");
                self.event_log.append(&format!("MQTT publish failed: {e}"));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{MemoryEventLog, MockBroker, MockWifiDriver};
    use tokio::time::Duration;

    fn link(driver: &MockWifiDriver, log: &MemoryEventLog) -> LinkSupervisor<MockWifiDriver> {
        LinkSupervisor::new(
            driver.clone(),
            Duration::from_millis(500),
            Duration::from_secs(15),
            Arc::new(log.clone()),
        )
    }

    async fn healthy_link(log: &MemoryEventLog) -> (MockWifiDriver, LinkSupervisor<MockWifiDriver>) {
        let driver = MockWifiDriver::new();
        driver.connects_after("home", Duration::ZERO);
        let mut link = link(&driver, log);
        link.connect_initial(&[crate::config::KnownNetwork::new("home", "pw1")])
            .await
            .unwrap();
        (driver, link)
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_requires_healthy_link() {
        let log = MemoryEventLog::new();
        let driver = MockWifiDriver::new();
        let link = link(&driver, &log);
        let broker = MockBroker::new();
        let mut supervisor = BrokerSupervisor::new(broker.clone(), Arc::new(log.clone()));

        let result = supervisor.connect(&link).await;

        assert!(matches!(result, Err(BrokerError::LinkUnavailable)));
        assert_eq!(broker.connect_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_and_publish() {
        let log = MemoryEventLog::new();
        let (_driver, link) = healthy_link(&log).await;
        let broker = MockBroker::new();
        let mut supervisor = BrokerSupervisor::new(broker.clone(), Arc::new(log.clone()));

        let session = supervisor.connect(&link).await.unwrap();
        supervisor
            .publish(&session, "sensors/scd40", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        assert_eq!(broker.connect_attempts(), 1);
        assert_eq!(broker.published_topics(), vec!["sensors/scd40"]);
        assert!(log.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_is_logged_not_retried() {
        let log = MemoryEventLog::new();
        let (_driver, link) = healthy_link(&log).await;
        let broker = MockBroker::new();
        broker.set_connect_ok(false);
        let mut supervisor = BrokerSupervisor::new(broker.clone(), Arc::new(log.clone()));

        assert!(matches!(
            supervisor.connect(&link).await,
            Err(BrokerError::ConnectFailed(_))
        ));
        assert_eq!(broker.connect_attempts(), 1);
        assert_eq!(log.entries().len(), 1);
        assert!(log.entries()[0].starts_with("MQTT connection failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_session_publish_fails() {
        let log = MemoryEventLog::new();
        let (_driver, link) = healthy_link(&log).await;
        let broker = MockBroker::new();
        let mut supervisor = BrokerSupervisor::new(broker.clone(), Arc::new(log.clone()));

        let session = supervisor.connect(&link).await.unwrap();
        broker.drop_sessions();

        let result = supervisor
            .publish(&session, "sensors/scd40", Bytes::from_static(b"{}"))
            .await;

        assert_eq!(result, Err(BrokerError::NotConnected));
        assert!(broker.published().is_empty());
        assert!(log.entries()[0].starts_with("MQTT publish failed"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(
            BrokerError::from(json_err),
            BrokerError::Serialization(_)
        ));
    }
}
