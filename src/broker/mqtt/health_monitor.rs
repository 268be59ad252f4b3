//! Pure session health decisions

use super::connection::{SessionEvent, SessionState};
use tracing::{debug, info, warn};

pub struct HealthMonitor;

impl HealthMonitor {
    /// Next session state after an observed event (pure function)
    pub fn determine_next_state(current: &SessionState, event: SessionEvent) -> SessionState {
        match (current, event) {
            // A dead session stays dead; recovery opens a new one
            (SessionState::Disconnected(reason), _) => SessionState::Disconnected(reason.clone()),
            (_, SessionEvent::ConnAckReceived) => SessionState::Connected,
            (_, SessionEvent::DisconnectedByBroker) => {
                SessionState::Disconnected("Broker disconnected".to_string())
            }
            (_, SessionEvent::NetworkError(error)) => SessionState::Disconnected(error),
            (state, SessionEvent::Infrastructure) => state.clone(),
        }
    }

    /// Whether a publish may be attempted in `state` (pure function)
    pub fn can_publish(state: &SessionState) -> bool {
        matches!(state, SessionState::Connected)
    }

    pub fn log_state_transition(from: &SessionState, to: &SessionState) {
        match (from, to) {
            (SessionState::Connecting, SessionState::Connected) => {
                info!("MQTT connection acknowledged");
            }
            (SessionState::Connected, SessionState::Disconnected(reason)) => {
                warn!("MQTT session lost: {}", reason);
            }
            (SessionState::Connecting, SessionState::Disconnected(reason)) => {
                warn!("MQTT connect aborted: {}", reason);
            }
            _ => {
                debug!("MQTT session state: {:?} -> {:?}", from, to);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connack_connects() {
        let next =
            HealthMonitor::determine_next_state(&SessionState::Connecting, SessionEvent::ConnAckReceived);
        assert_eq!(next, SessionState::Connected);
        assert!(HealthMonitor::can_publish(&next));
    }

    #[test]
    fn test_network_error_disconnects() {
        let next = HealthMonitor::determine_next_state(
            &SessionState::Connected,
            SessionEvent::NetworkError("reset by peer".to_string()),
        );
        assert_eq!(next, SessionState::Disconnected("reset by peer".to_string()));
        assert!(!HealthMonitor::can_publish(&next));
    }

    #[test]
    fn test_disconnected_is_terminal() {
        let dead = SessionState::Disconnected("gone".to_string());
        let next = HealthMonitor::determine_next_state(&dead, SessionEvent::ConnAckReceived);
        assert_eq!(next, dead);
    }

    #[test]
    fn test_infrastructure_keeps_state() {
        let next =
            HealthMonitor::determine_next_state(&SessionState::Connected, SessionEvent::Infrastructure);
        assert_eq!(next, SessionState::Connected);
        assert!(!HealthMonitor::can_publish(&SessionState::Connecting));
    }
}
