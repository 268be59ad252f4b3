//! Recovery state machine
//!
//! One tick checks the link first, then the broker, and only samples when
//! both are healthy. Every wait happens inside the indicator patterns, the
//! heartbeat cadence or the bounded reconnect polls, so a tick always runs
//! to completion before the next one starts.

use super::state::{
    log_state_transition, transition, ConnectionState, Observation, RetryCounter, SupervisorStats,
};
use crate::broker::{BrokerError, BrokerSupervisor, BrokerTransport};
use crate::config::Timing;
use crate::error::{ErrorCode, MonitorError, MonitorResult};
use crate::event_log::EventLog;
use crate::indicator::{Signal, StatusIndicator};
use crate::link::{ActiveNetwork, LinkSupervisor, WifiDriver};
use crate::protocol::{telemetry_payload, StatusEvent, TopicSet};
use crate::sensor::SensorSource;
use crate::{recovery_span, tick_span};
use bytes::Bytes;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn, Instrument};

/// Everything the machine drives
pub struct Collaborators<D: WifiDriver, B: BrokerTransport, S: SensorSource> {
    pub link: LinkSupervisor<D>,
    pub broker: BrokerSupervisor<B>,
    /// `None` when the sensor failed to start; sampling is then disabled
    pub sensor: Option<S>,
    pub indicator: StatusIndicator,
    pub event_log: Arc<dyn EventLog>,
}

pub struct RecoveryStateMachine<D: WifiDriver, B: BrokerTransport, S: SensorSource> {
    link: LinkSupervisor<D>,
    broker: BrokerSupervisor<B>,
    sensor: Option<S>,
    indicator: StatusIndicator,
    event_log: Arc<dyn EventLog>,
    topics: TopicSet,
    timing: Timing,
    active_network: ActiveNetwork,
    session: Option<B::Session>,
    state: ConnectionState,
    link_retries: RetryCounter,
    broker_retries: RetryCounter,
    stats: SupervisorStats,
}

impl<D: WifiDriver, B: BrokerTransport, S: SensorSource> RecoveryStateMachine<D, B, S> {
    /// Without a session the machine starts out recovering the broker
    pub fn new(
        parts: Collaborators<D, B, S>,
        topics: TopicSet,
        timing: Timing,
        active_network: ActiveNetwork,
        session: Option<B::Session>,
    ) -> Self {
        let state = if session.is_some() {
            ConnectionState::Normal
        } else {
            ConnectionState::RecoveringBroker
        };

        Self {
            link: parts.link,
            broker: parts.broker,
            sensor: parts.sensor,
            indicator: parts.indicator,
            event_log: parts.event_log,
            topics,
            timing,
            active_network,
            session,
            state,
            link_retries: RetryCounter::default(),
            broker_retries: RetryCounter::default(),
            stats: SupervisorStats::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn link_retries(&self) -> u32 {
        self.link_retries.get()
    }

    pub fn broker_retries(&self) -> u32 {
        self.broker_retries.get()
    }

    pub fn stats(&self) -> &SupervisorStats {
        &self.stats
    }

    pub fn active_network(&self) -> &ActiveNetwork {
        &self.active_network
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn sampling_enabled(&self) -> bool {
        self.sensor.is_some()
    }

    /// Run ticks forever. A failed tick is reported and the loop goes on.
    pub async fn run_forever(&mut self) {
        info!(state = %self.state, "Starting supervisory loop");
        loop {
            self.run_once().await;
        }
    }

    /// One tick with the fault boundary around it
    pub async fn run_once(&mut self) {
        if let Err(e) = self.tick().await {
            self.report_fault(e).await;
        }
    }

    /// Log an uncaught tick error and show its code for the display window.
    /// State is left untouched.
    pub async fn report_fault(&mut self, fault: MonitorError) {
        self.stats.runtime_faults += 1;
        let code = fault.error_code();
        error!(error = %fault, code = %code, "Error in main loop");
        self.event_log
            .append(&format!("Main loop error: {}", fault.to_log_message()));
        self.indicator
            .continuous_error(code, self.timing.error_display)
            .await;
    }

    /// Evaluate once: link first, then broker, then sample
    pub async fn tick(&mut self) -> MonitorResult<()> {
        self.stats.ticks += 1;
        let span = tick_span!(tick = self.stats.ticks, state = %self.state);
        self.evaluate().instrument(span).await
    }

    async fn evaluate(&mut self) -> MonitorResult<()> {
        // Link loss supersedes any broker condition
        if self.state != ConnectionState::RecoveringLink && !self.link.is_connected().await {
            self.enter_link_recovery();
        }

        match self.state {
            ConnectionState::RecoveringLink => {
                self.recover_link().await;
                Ok(())
            }
            ConnectionState::RecoveringBroker => self.recover_broker().await,
            ConnectionState::Normal => self.sampling_cycle().await,
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if next != self.state {
            log_state_transition(self.state, next);
            self.state = next;
        }
    }

    fn enter_link_recovery(&mut self) {
        self.set_state(transition(self.state, Observation::LinkDown));
        self.link_retries.reset();
        self.stats.link_drops += 1;
        self.event_log.append(&format!(
            "WiFi connection lost - attempting reconnection to {}",
            self.active_network.ssid()
        ));
    }

    fn enter_broker_recovery(&mut self) {
        self.set_state(transition(self.state, Observation::PublishFailed));
        self.broker_retries.reset();
        self.stats.broker_drops += 1;
    }

    async fn recover_link(&mut self) {
        let span = recovery_span!(
            kind = "link",
            attempt = self.link_retries.get() + 1,
            ssid = %self.active_network.ssid()
        );
        self.stats.link_reconnect_attempts += 1;

        let result = self
            .link
            .reconnect(
                &self.active_network,
                self.timing.reconnect_timeout,
                &mut self.indicator,
            )
            .instrument(span)
            .await;

        match result {
            Ok(()) => {
                self.link_retries.reset();
                // A broker session is not carried across a link outage
                self.broker_retries.reset();
                self.set_state(transition(self.state, Observation::LinkRestored));
                info!(stats = ?self.stats, "Link recovery episode ended");
            }
            Err(e) => {
                let failures = self.link_retries.increment();
                warn!(failures, error = %e, "WiFi reconnect attempt failed");
                self.indicator
                    .continuous_error(ErrorCode::Link, self.timing.error_display)
                    .await;
            }
        }
    }

    async fn recover_broker(&mut self) -> MonitorResult<()> {
        let span = recovery_span!(kind = "broker", attempt = self.broker_retries.get() + 1);
        self.recover_broker_attempt().instrument(span).await
    }

    async fn recover_broker_attempt(&mut self) -> MonitorResult<()> {
        self.stats.broker_reconnect_attempts += 1;
        // Stop the old session before opening a new one
        self.session = None;

        let session = match self.broker.connect(&self.link).await {
            Ok(session) => session,
            Err(e) => {
                let failures = self.broker_retries.increment();
                warn!(failures, error = %e, "MQTT reconnect attempt failed");
                self.indicator
                    .continuous_error(ErrorCode::Broker, self.timing.error_display)
                    .await;
                return Ok(());
            }
        };

        let attempts = self.broker_retries.increment();
        let payload = StatusEvent::MqttReconnected { attempts }.to_payload()?;
        let notified = self
            .broker
            .publish(&session, &self.topics.events, payload)
            .await;
        self.session = Some(session);

        match notified {
            Ok(()) => {
                self.broker_retries.reset();
                self.set_state(transition(self.state, Observation::BrokerRestored));
                info!(attempts, stats = ?self.stats, "Broker recovery episode ended");
            }
            Err(e) => {
                // A session that cannot carry one message is not recovered
                warn!(attempts, error = %e, "Reconnected but recovery event was not delivered");
                self.indicator
                    .continuous_error(ErrorCode::Broker, self.timing.error_display)
                    .await;
            }
        }
        Ok(())
    }

    async fn sampling_cycle(&mut self) -> MonitorResult<()> {
        for _ in 0..self.timing.heartbeat_pulses {
            self.indicator.show(Signal::Heartbeat).await;
            sleep(self.timing.heartbeat_interval).await;
        }

        let Some(sensor) = self.sensor.as_mut() else {
            debug!("Sampling disabled, sensor unavailable");
            self.indicator.show(Signal::Error(ErrorCode::Sensor)).await;
            return Ok(());
        };

        match sensor.read().await {
            Ok(Some(measurement)) => {
                let payload = telemetry_payload(&measurement)?;
                let topic = self.topics.telemetry.clone();
                if self.publish_or_degrade(&topic, payload).await {
                    self.stats.measurements_published += 1;
                    info!(
                        co2 = measurement.co2,
                        temp = measurement.temperature,
                        rh = measurement.relative_humidity,
                        "Published measurement"
                    );
                }
            }
            Ok(None) => {
                info!("Waiting for valid data...");
                let payload = StatusEvent::SensorWaitingForData.to_payload()?;
                let topic = self.topics.events.clone();
                if self.publish_or_degrade(&topic, payload).await {
                    self.stats.waiting_events += 1;
                }
            }
            Err(e) => {
                self.stats.sensor_faults += 1;
                warn!(error = %e, "Sensor read failed");
                self.event_log.append(&format!("Sensor read failed: {e}"));
                self.indicator
                    .continuous_error(ErrorCode::Sensor, self.timing.error_display)
                    .await;
            }
        }
        Ok(())
    }

    /// Publish on the current session; any failure starts broker recovery
    async fn publish_or_degrade(&mut self, topic: &str, payload: Bytes) -> bool {
        let result = match &self.session {
            Some(session) => self.broker.publish(session, topic, payload).await,
            None => {
                self.event_log
                    .append(&format!("MQTT publish failed: {}", BrokerError::NotConnected));
                Err(BrokerError::NotConnected)
            }
        };

        match result {
            Ok(()) => true,
            Err(_) => {
                self.enter_broker_recovery();
                false
            }
        }
    }
}
