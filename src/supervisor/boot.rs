//! Boot sequence
//!
//! Brings the node from power-on to a running state machine. Nothing in here
//! halts the device: a missing link is rescanned until one network answers,
//! a missing broker hands the machine over in broker recovery, and a missing
//! sensor only disables sampling.

use super::machine::{Collaborators, RecoveryStateMachine};
use crate::broker::BrokerTransport;
use crate::config::{KnownNetwork, Timing};
use crate::error::{ErrorCode, MonitorResult};
use crate::link::{LinkError, WifiDriver};
use crate::protocol::TopicSet;
use crate::sensor::{SensorError, SensorSource};
use tracing::{info, warn};

pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the boot sequence and return the machine ready to tick.
///
/// Only an empty network list is an error, since rescanning it can never
/// succeed.
pub async fn boot<D, B, S>(
    mut parts: Collaborators<D, B, S>,
    networks: &[KnownNetwork],
    topics: TopicSet,
    timing: Timing,
) -> MonitorResult<RecoveryStateMachine<D, B, S>>
where
    D: WifiDriver,
    B: BrokerTransport,
    S: SensorSource,
{
    parts.indicator.startup().await;
    info!(version = FIRMWARE_VERSION, "Environmental Monitoring System starting");

    let active = loop {
        match parts.link.connect_initial(networks).await {
            Ok(active) => break active,
            Err(LinkError::NoCandidates) => return Err(LinkError::NoCandidates.into()),
            Err(e) => {
                if !matches!(e, LinkError::AllCandidatesExhausted { .. }) {
                    parts.event_log.append(&format!("WiFi connection failed: {e}"));
                }
                warn!(error = %e, "No network reachable, rescanning");
                parts
                    .indicator
                    .continuous_error(ErrorCode::Link, timing.error_display)
                    .await;
            }
        }
    };
    info!(ssid = %active.ssid(), "Connected to WiFi network");

    let session = match parts.broker.connect(&parts.link).await {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(error = %e, "Broker unavailable at boot, starting in broker recovery");
            None
        }
    };

    if let Some(sensor) = parts.sensor.as_mut() {
        if let Err(e) = sensor.start().await {
            let message = match &e {
                SensorError::DeviceAbsent { address } => {
                    format!("SCD-40 not found on I2C bus at {address:#04x}")
                }
                SensorError::ReadFault(_) => format!("Sensor initialization failed: {e}"),
            };
            warn!("{}; sampling disabled", message);
            parts.event_log.append(&message);
            parts
                .indicator
                .continuous_error(ErrorCode::Sensor, timing.error_display)
                .await;
            parts.sensor = None;
        }
    }

    info!("All systems ready - starting main loop");
    Ok(RecoveryStateMachine::new(
        parts, topics, timing, active, session,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerSupervisor;
    use crate::supervisor::ConnectionState;
    use crate::testing::mocks::{MockBroker, MockSensor};
    use crate::testing::MockNode;
    use tokio::time::{Duration, Instant};

    fn parts(
        node: &MockNode,
        sensor: MockSensor,
    ) -> Collaborators<crate::testing::MockWifiDriver, MockBroker, MockSensor> {
        Collaborators {
            link: node.link(),
            broker: BrokerSupervisor::new(node.broker.clone(), node.event_log()),
            sensor: Some(sensor),
            indicator: node.indicator(),
            event_log: node.event_log(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_happy_boot() {
        let node = MockNode::new();
        let start = Instant::now();

        let machine = boot(
            parts(&node, node.sensor.clone()),
            &MockNode::networks(),
            TopicSet::default(),
            node.timing,
        )
        .await
        .unwrap();

        assert_eq!(machine.state(), ConnectionState::Normal);
        assert!(machine.sampling_enabled());
        assert!(node.sensor.was_started());
        assert_eq!(node.pin.on_durations(), vec![Duration::from_secs(5)]);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert!(node.log.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_broker_down_starts_in_broker_recovery() {
        let node = MockNode::new();
        node.broker.set_connect_ok(false);

        let machine = boot(
            parts(&node, node.sensor.clone()),
            &MockNode::networks(),
            TopicSet::default(),
            node.timing,
        )
        .await
        .unwrap();

        assert_eq!(machine.state(), ConnectionState::RecoveringBroker);
        assert!(!machine.has_session());
        assert!(node.log.contains("MQTT connection failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_sensor_disables_sampling() {
        let node = MockNode::new();

        let machine = boot(
            parts(&node, MockSensor::absent()),
            &MockNode::networks(),
            TopicSet::default(),
            node.timing,
        )
        .await
        .unwrap();

        assert_eq!(machine.state(), ConnectionState::Normal);
        assert!(!machine.sampling_enabled());
        assert_eq!(
            node.log.entries(),
            vec!["SCD-40 not found on I2C bus at 0x62"]
        );
        // Startup pulse plus three passes of the 3-blink pattern
        assert_eq!(node.pin.pulse_count(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_scan_is_repeated_until_a_network_answers() {
        let node = MockNode::default();
        let networks = vec![
            KnownNetwork::new("home", "pw1"),
            KnownNetwork::new("backup", "pw2"),
        ];

        // First scan exhausts at 31 s, the code-1 window runs until 36 s
        let driver = node.driver.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(33)).await;
            driver.connects_after("backup", Duration::ZERO);
        });

        let machine = boot(
            parts(&node, node.sensor.clone()),
            &networks,
            TopicSet::default(),
            node.timing,
        )
        .await
        .unwrap();

        assert_eq!(machine.active_network().ssid(), "backup");
        assert_eq!(
            node.driver.join_history(),
            vec!["home", "backup", "home", "backup"]
        );
        assert_eq!(
            node.log.entries(),
            vec!["WiFi connection failed - all networks exhausted"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_network_list_is_an_error() {
        let node = MockNode::new();
        let result = boot(
            parts(&node, node.sensor.clone()),
            &[],
            TopicSet::default(),
            node.timing,
        )
        .await;
        assert!(matches!(
            result,
            Err(crate::error::MonitorError::Link(LinkError::NoCandidates))
        ));
    }
}
