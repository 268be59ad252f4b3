//! Supervisor state, retry counters and statistics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Which dependency, if any, is being recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Normal,
    RecoveringLink,
    RecoveringBroker,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Normal => "normal",
            ConnectionState::RecoveringLink => "recovering_link",
            ConnectionState::RecoveringBroker => "recovering_broker",
        };
        f.write_str(name)
    }
}

/// Facts a tick can establish that move the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    LinkDown,
    LinkRestored,
    BrokerRestored,
    PublishFailed,
}

/// Next state for an observation (pure function).
///
/// Link loss wins from any state. Every other observation only applies to
/// the state it belongs to and is ignored elsewhere.
pub fn transition(current: ConnectionState, observation: Observation) -> ConnectionState {
    use ConnectionState::*;
    match (current, observation) {
        (_, Observation::LinkDown) => RecoveringLink,
        (RecoveringLink, Observation::LinkRestored) => Normal,
        (RecoveringBroker, Observation::BrokerRestored) => Normal,
        (Normal, Observation::PublishFailed) => RecoveringBroker,
        (state, _) => state,
    }
}

/// Log a state transition
pub fn log_state_transition(from: ConnectionState, to: ConnectionState) {
    use ConnectionState::*;
    match (from, to) {
        (Normal, RecoveringLink) | (RecoveringBroker, RecoveringLink) => {
            warn!("WiFi connection lost - entering reconnection mode");
        }
        (Normal, RecoveringBroker) => {
            warn!("MQTT session lost - entering reconnection mode");
        }
        (RecoveringLink, Normal) => {
            info!("WiFi reconnection successful - resuming normal operation");
        }
        (RecoveringBroker, Normal) => {
            info!("MQTT reconnection successful - resuming normal operation");
        }
        _ => {
            info!("State transition: {} -> {}", from, to);
        }
    }
}

/// Consecutive failed attempts in the current recovery episode.
///
/// Diagnostic only; recovery never gives up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryCounter(u32);

impl RetryCounter {
    pub fn get(self) -> u32 {
        self.0
    }

    /// Count one more attempt and return the new value
    pub fn increment(&mut self) -> u32 {
        self.0 = self.0.saturating_add(1);
        self.0
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Running totals since boot
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStats {
    pub started_at: DateTime<Utc>,
    pub ticks: u64,
    pub link_drops: u64,
    pub broker_drops: u64,
    pub link_reconnect_attempts: u64,
    pub broker_reconnect_attempts: u64,
    pub measurements_published: u64,
    pub waiting_events: u64,
    pub sensor_faults: u64,
    pub runtime_faults: u64,
}

impl SupervisorStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            ticks: 0,
            link_drops: 0,
            broker_drops: 0,
            link_reconnect_attempts: 0,
            broker_reconnect_attempts: 0,
            measurements_published: 0,
            waiting_events: 0,
            sensor_faults: 0,
            runtime_faults: 0,
        }
    }

    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

impl Default for SupervisorStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_state() -> impl Strategy<Value = ConnectionState> {
        prop_oneof![
            Just(ConnectionState::Normal),
            Just(ConnectionState::RecoveringLink),
            Just(ConnectionState::RecoveringBroker),
        ]
    }

    fn any_observation() -> impl Strategy<Value = Observation> {
        prop_oneof![
            Just(Observation::LinkDown),
            Just(Observation::LinkRestored),
            Just(Observation::BrokerRestored),
            Just(Observation::PublishFailed),
        ]
    }

    proptest! {
        #[test]
        fn link_down_always_recovers_link(state in any_state()) {
            prop_assert_eq!(
                transition(state, Observation::LinkDown),
                ConnectionState::RecoveringLink
            );
        }

        #[test]
        fn broker_recovery_never_entered_from_link_recovery(obs in any_observation()) {
            prop_assert_ne!(
                transition(ConnectionState::RecoveringLink, obs),
                ConnectionState::RecoveringBroker
            );
        }
    }

    #[test]
    fn test_recovery_exits() {
        assert_eq!(
            transition(ConnectionState::RecoveringLink, Observation::LinkRestored),
            ConnectionState::Normal
        );
        assert_eq!(
            transition(ConnectionState::RecoveringBroker, Observation::BrokerRestored),
            ConnectionState::Normal
        );
    }

    #[test]
    fn test_publish_failure_only_matters_in_normal() {
        assert_eq!(
            transition(ConnectionState::Normal, Observation::PublishFailed),
            ConnectionState::RecoveringBroker
        );
        assert_eq!(
            transition(ConnectionState::RecoveringLink, Observation::PublishFailed),
            ConnectionState::RecoveringLink
        );
    }

    #[test]
    fn test_mismatched_restore_is_ignored() {
        assert_eq!(
            transition(ConnectionState::RecoveringBroker, Observation::LinkRestored),
            ConnectionState::RecoveringBroker
        );
        assert_eq!(
            transition(ConnectionState::Normal, Observation::BrokerRestored),
            ConnectionState::Normal
        );
    }

    #[test]
    fn test_retry_counter() {
        let mut counter = RetryCounter::default();
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.get(), 2);
        counter.reset();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::RecoveringBroker.to_string(), "recovering_broker");
    }

    #[test]
    fn test_stats_start_at_zero() {
        let stats = SupervisorStats::new();
        assert_eq!(stats.ticks, 0);
        assert!(stats.uptime() >= chrono::Duration::zero());
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["runtime_faults"], 0);
    }
}
