//! rumqttc-backed broker transport
//!
//! Every `connect` builds a new client and event loop, so nothing from a
//! previous session leaks into the next one. The event loop is polled by a
//! background task that reports session state through a `watch` channel; it
//! stops at the first error instead of letting rumqttc reconnect on its own,
//! which leaves the session stale until the supervisor opens a fresh one.

use super::connection::{configure_mqtt_options, route_event, SessionEvent, SessionState};
use super::health_monitor::HealthMonitor;
use crate::broker::{BrokerError, BrokerTransport};
use crate::config::MqttSection;
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, EventLoop};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info};

/// Request channel capacity; one item is ever in flight
const REQUEST_CAPACITY: usize = 10;

/// One live broker session. Dropping it stops the poller.
pub struct MqttSession {
    client: AsyncClient,
    state_rx: watch::Receiver<SessionState>,
    poller: JoinHandle<()>,
}

impl MqttSession {
    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    /// Check session state before operations
    fn check_connection_state(&self) -> Result<(), BrokerError> {
        let current_state = self.state_rx.borrow().clone();
        if !HealthMonitor::can_publish(&current_state) {
            debug!("Refusing publish on stale session: {:?}", current_state);
            return Err(BrokerError::NotConnected);
        }
        Ok(())
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

/// Broker transport speaking MQTT v5
pub struct MqttBroker {
    client_id: String,
    config: MqttSection,
}

impl MqttBroker {
    /// Validates the broker URL up front so a typo fails at startup
    pub fn new(client_id: &str, config: MqttSection) -> Result<Self, BrokerError> {
        configure_mqtt_options(client_id, &config)?;
        Ok(Self {
            client_id: client_id.to_string(),
            config,
        })
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.config.connect_timeout_secs)
    }

    /// Wait for ConnAck with timeout
    pub(crate) async fn wait_for_connection_confirmation(
        mut state_rx: watch::Receiver<SessionState>,
        timeout: Duration,
    ) -> Result<(), BrokerError> {
        let timeout_result = tokio::time::timeout(timeout, async {
            loop {
                let observed = state_rx.borrow_and_update().clone();
                match observed {
                    SessionState::Connected => return Ok(()),
                    SessionState::Disconnected(reason) => {
                        return Err(BrokerError::ConnectFailed(reason));
                    }
                    SessionState::Connecting => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(BrokerError::ConnectFailed(
                        "State channel closed".to_string(),
                    ));
                }
            }
        })
        .await;

        match timeout_result {
            Ok(result) => result,
            Err(_) => Err(BrokerError::ConnectFailed(
                "ConnAck timeout - no connection confirmation received".to_string(),
            )),
        }
    }

    /// Drive the event loop until the session dies
    async fn run_poller(mut event_loop: EventLoop, state_tx: watch::Sender<SessionState>) {
        loop {
            let current = state_tx.borrow().clone();
            let next = match event_loop.poll().await {
                Ok(event) => HealthMonitor::determine_next_state(&current, route_event(&event)),
                Err(e) => {
                    error!("MQTT event loop error: {}", e);
                    HealthMonitor::determine_next_state(
                        &current,
                        SessionEvent::NetworkError(e.to_string()),
                    )
                }
            };

            if next != current {
                HealthMonitor::log_state_transition(&current, &next);
                let _ = state_tx.send(next.clone());
            }

            if matches!(next, SessionState::Disconnected(_)) {
                break;
            }
        }
        debug!("MQTT poller stopped");
    }
}

#[async_trait]
impl BrokerTransport for MqttBroker {
    type Session = MqttSession;

    async fn connect(&mut self) -> Result<MqttSession, BrokerError> {
        let options = configure_mqtt_options(&self.client_id, &self.config)?;
        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);

        info!(
            broker = %self.config.broker_url,
            client_id = %self.client_id,
            "Opening MQTT session"
        );
        let poller = tokio::spawn(Self::run_poller(event_loop, state_tx));
        let session = MqttSession {
            client,
            state_rx: state_rx.clone(),
            poller,
        };

        // On failure the session is dropped here, which stops the poller
        Self::wait_for_connection_confirmation(state_rx, self.connect_timeout()).await?;
        Ok(session)
    }

    async fn publish(
        &self,
        session: &MqttSession,
        topic: &str,
        payload: Bytes,
    ) -> Result<(), BrokerError> {
        session.check_connection_state()?;
        session
            .client
            .publish(topic.to_string(), QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| BrokerError::PublishFailed(e.to_string()))
    }
}
