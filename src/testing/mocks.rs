//! Mock implementations for testing
//!
//! Every mock is a cheap-clone handle over shared state: hand one clone to
//! the code under test and keep another to script failures and inspect what
//! happened.

use crate::broker::{BrokerError, BrokerTransport};
use crate::config::KnownNetwork;
use crate::error::sanitize_error_message;
use crate::event_log::EventLog;
use crate::indicator::IndicatorPin;
use crate::link::{LinkError, LinkStatus, WifiDriver};
use crate::sensor::{Measurement, SensorError, SensorSource, SCD40_I2C_ADDRESS};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::{Duration, Instant};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct WifiState {
    /// `Some(delay)`: associates `delay` after join. Missing or `None`: never.
    behaviours: HashMap<String, Option<Duration>>,
    joined: Option<(String, Instant)>,
    join_history: Vec<String>,
    activated: bool,
}

/// Scriptable radio driver
#[derive(Debug, Clone, Default)]
pub struct MockWifiDriver {
    state: Arc<Mutex<WifiState>>,
}

impl MockWifiDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `ssid` reports connected `delay` after each join
    pub fn connects_after(&self, ssid: &str, delay: Duration) {
        lock(&self.state)
            .behaviours
            .insert(ssid.to_string(), Some(delay));
    }

    /// `ssid` never reaches connected. Also takes down a current link to it.
    pub fn never_connects(&self, ssid: &str) {
        lock(&self.state).behaviours.insert(ssid.to_string(), None);
    }

    /// Lose the current association; a new join is needed
    pub fn drop_link(&self) {
        lock(&self.state).joined = None;
    }

    pub fn join_history(&self) -> Vec<String> {
        lock(&self.state).join_history.clone()
    }

    pub fn was_activated(&self) -> bool {
        lock(&self.state).activated
    }

    /// Whether the radio would report connected right now
    pub fn is_up(&self) -> bool {
        Self::connected(&lock(&self.state))
    }

    fn connected(state: &WifiState) -> bool {
        match &state.joined {
            Some((ssid, joined_at)) => matches!(
                state.behaviours.get(ssid),
                Some(Some(delay)) if joined_at.elapsed() >= *delay
            ),
            None => false,
        }
    }
}

#[async_trait]
impl WifiDriver for MockWifiDriver {
    async fn activate(&mut self) -> Result<(), LinkError> {
        lock(&self.state).activated = true;
        Ok(())
    }

    async fn join(&mut self, network: &KnownNetwork) -> Result<(), LinkError> {
        let mut state = lock(&self.state);
        state.join_history.push(network.ssid.clone());
        state.joined = Some((network.ssid.clone(), Instant::now()));
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        Self::connected(&lock(&self.state))
    }

    async fn status(&self) -> LinkStatus {
        let state = lock(&self.state);
        match &state.joined {
            None => LinkStatus::Idle,
            Some(_) if Self::connected(&state) => LinkStatus::GotIp,
            Some((ssid, _)) => match state.behaviours.get(ssid) {
                Some(Some(_)) => LinkStatus::Connecting,
                _ => LinkStatus::NoApFound,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct BrokerState {
    connect_ok: bool,
    connect_failures_remaining: u32,
    publish_ok: bool,
    publish_failures_remaining: u32,
    connect_attempts: u32,
    publish_attempts: u32,
    live_generation: u64,
    published: Vec<(String, Bytes)>,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            connect_ok: true,
            connect_failures_remaining: 0,
            publish_ok: true,
            publish_failures_remaining: 0,
            connect_attempts: 0,
            publish_attempts: 0,
            live_generation: 0,
            published: Vec::new(),
        }
    }
}

/// Session handed out by [`MockBroker`]; stale once a newer one exists or
/// [`MockBroker::drop_sessions`] is called
#[derive(Debug)]
pub struct MockSession {
    generation: u64,
}

/// Scriptable broker transport recording everything published
#[derive(Debug, Clone, Default)]
pub struct MockBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connect_ok(&self, ok: bool) {
        lock(&self.state).connect_ok = ok;
    }

    pub fn fail_next_connects(&self, count: u32) {
        lock(&self.state).connect_failures_remaining = count;
    }

    pub fn set_publish_ok(&self, ok: bool) {
        lock(&self.state).publish_ok = ok;
    }

    pub fn fail_next_publishes(&self, count: u32) {
        lock(&self.state).publish_failures_remaining = count;
    }

    /// Invalidate every session handed out so far
    pub fn drop_sessions(&self) {
        lock(&self.state).live_generation += 1;
    }

    pub fn connect_attempts(&self) -> u32 {
        lock(&self.state).connect_attempts
    }

    pub fn publish_attempts(&self) -> u32 {
        lock(&self.state).publish_attempts
    }

    pub fn published(&self) -> Vec<(String, Bytes)> {
        lock(&self.state).published.clone()
    }

    pub fn published_topics(&self) -> Vec<String> {
        lock(&self.state)
            .published
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    /// Successfully published payloads on `topic`, decoded as JSON
    pub fn published_json(&self, topic: &str) -> Vec<Value> {
        lock(&self.state)
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .filter_map(|(_, payload)| serde_json::from_slice(payload).ok())
            .collect()
    }

    pub fn clear_history(&self) {
        let mut state = lock(&self.state);
        state.published.clear();
        state.connect_attempts = 0;
        state.publish_attempts = 0;
    }
}

#[async_trait]
impl BrokerTransport for MockBroker {
    type Session = MockSession;

    async fn connect(&mut self) -> Result<MockSession, BrokerError> {
        let mut state = lock(&self.state);
        state.connect_attempts += 1;

        if state.connect_failures_remaining > 0 {
            state.connect_failures_remaining -= 1;
            return Err(BrokerError::ConnectFailed("Mock connection failure".to_string()));
        }
        if !state.connect_ok {
            return Err(BrokerError::ConnectFailed("Mock connection failure".to_string()));
        }

        state.live_generation += 1;
        Ok(MockSession {
            generation: state.live_generation,
        })
    }

    async fn publish(
        &self,
        session: &MockSession,
        topic: &str,
        payload: Bytes,
    ) -> Result<(), BrokerError> {
        let mut state = lock(&self.state);
        state.publish_attempts += 1;

        if session.generation != state.live_generation {
            return Err(BrokerError::NotConnected);
        }
        if state.publish_failures_remaining > 0 {
            state.publish_failures_remaining -= 1;
            return Err(BrokerError::PublishFailed("Mock publish failure".to_string()));
        }
        if !state.publish_ok {
            return Err(BrokerError::PublishFailed("Mock publish failure".to_string()));
        }

        state.published.push((topic.to_string(), payload));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sensor
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SensorState {
    absent: bool,
    started: bool,
    reads: u32,
    /// Scripted read results; an empty queue reads as "no data yet"
    queue: VecDeque<Result<Option<Measurement>, SensorError>>,
}

/// Scriptable sensor
#[derive(Debug, Clone, Default)]
pub struct MockSensor {
    state: Arc<Mutex<SensorState>>,
}

impl MockSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sensor that fails to start
    pub fn absent() -> Self {
        let sensor = Self::default();
        lock(&sensor.state).absent = true;
        sensor
    }

    pub fn push_reading(&self, measurement: Measurement) {
        lock(&self.state).queue.push_back(Ok(Some(measurement)));
    }

    pub fn push_not_ready(&self) {
        lock(&self.state).queue.push_back(Ok(None));
    }

    pub fn push_fault(&self, reason: &str) {
        lock(&self.state)
            .queue
            .push_back(Err(SensorError::ReadFault(reason.to_string())));
    }

    pub fn was_started(&self) -> bool {
        lock(&self.state).started
    }

    pub fn reads(&self) -> u32 {
        lock(&self.state).reads
    }
}

#[async_trait]
impl SensorSource for MockSensor {
    async fn start(&mut self) -> Result<(), SensorError> {
        let mut state = lock(&self.state);
        if state.absent {
            return Err(SensorError::DeviceAbsent {
                address: SCD40_I2C_ADDRESS,
            });
        }
        state.started = true;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Measurement>, SensorError> {
        let mut state = lock(&self.state);
        state.reads += 1;
        state.queue.pop_front().unwrap_or(Ok(None))
    }
}

// ---------------------------------------------------------------------------
// Indicator and event log
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PinState {
    on_since: Option<Instant>,
    pulses: Vec<Duration>,
}

/// Indicator pin that records every completed on-pulse
#[derive(Debug, Clone, Default)]
pub struct RecordingPin {
    state: Arc<Mutex<PinState>>,
}

impl RecordingPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed pulses (on followed by off)
    pub fn pulse_count(&self) -> usize {
        lock(&self.state).pulses.len()
    }

    pub fn on_durations(&self) -> Vec<Duration> {
        lock(&self.state).pulses.clone()
    }

    pub fn is_on(&self) -> bool {
        lock(&self.state).on_since.is_some()
    }

    pub fn clear(&self) {
        lock(&self.state).pulses.clear();
    }
}

impl IndicatorPin for RecordingPin {
    fn set(&mut self, on: bool) {
        let mut state = lock(&self.state);
        match (on, state.on_since) {
            (true, None) => state.on_since = Some(Instant::now()),
            (false, Some(since)) => {
                state.pulses.push(since.elapsed());
                state.on_since = None;
            }
            _ => {}
        }
    }
}

/// In-memory event log; entries are stored sanitized, without timestamps
#[derive(Debug, Clone, Default)]
pub struct MemoryEventLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        lock(&self.entries).iter().any(|entry| entry.contains(needle))
    }
}

impl EventLog for MemoryEventLog {
    fn append(&self, message: &str) {
        lock(&self.entries).push(sanitize_error_message(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_mock_wifi_delay() {
        let mut driver = MockWifiDriver::new();
        driver.connects_after("home", Duration::from_secs(2));
        driver.join(&KnownNetwork::new("home", "pw")).await.unwrap();

        assert!(!driver.is_connected().await);
        assert_eq!(driver.status().await, LinkStatus::Connecting);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(driver.is_connected().await);

        driver.never_connects("home");
        assert!(!driver.is_connected().await);
        assert_eq!(driver.status().await, LinkStatus::NoApFound);
    }

    #[tokio::test]
    async fn test_mock_broker_generations() {
        let mut broker = MockBroker::new();
        let first = broker.connect().await.unwrap();
        let second = broker.connect().await.unwrap();

        assert_eq!(
            broker.publish(&first, "t", Bytes::new()).await,
            Err(BrokerError::NotConnected)
        );
        assert!(broker.publish(&second, "t", Bytes::new()).await.is_ok());
        assert_eq!(broker.published_topics(), vec!["t"]);
        assert_eq!(broker.publish_attempts(), 2);
    }

    #[tokio::test]
    async fn test_mock_broker_scripted_failures() {
        let mut broker = MockBroker::new();
        broker.fail_next_connects(1);
        assert!(broker.connect().await.is_err());
        let session = broker.connect().await.unwrap();

        broker.fail_next_publishes(1);
        assert!(broker.publish(&session, "t", Bytes::new()).await.is_err());
        assert!(broker.publish(&session, "t", Bytes::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_sensor_queue() {
        let mut sensor = MockSensor::new();
        sensor.push_reading(Measurement::new(500, 20.0, 40.0));
        sensor.push_fault("crc");

        assert!(sensor.read().await.unwrap().is_some());
        assert!(sensor.read().await.is_err());
        assert_eq!(sensor.read().await.unwrap(), None);
        assert_eq!(sensor.reads(), 3);
    }

    #[test]
    fn test_memory_event_log_sanitizes() {
        let log = MemoryEventLog::new();
        log.append("join failed password=hunter2");
        assert!(!log.contains("hunter2"));
    }
}
