//! A fully mocked node, wired the same way the binary wires real drivers

use super::mocks::{MemoryEventLog, MockBroker, MockSensor, MockWifiDriver, RecordingPin};
use crate::broker::BrokerSupervisor;
use crate::config::{KnownNetwork, Timing};
use crate::event_log::EventLog;
use crate::indicator::StatusIndicator;
use crate::link::{ActiveNetwork, LinkSupervisor};
use crate::protocol::TopicSet;
use crate::supervisor::{Collaborators, RecoveryStateMachine};
use std::sync::Arc;
use tokio::time::Duration;

pub type MockMachine = RecoveryStateMachine<MockWifiDriver, MockBroker, MockSensor>;

/// Handles to every mocked collaborator of one node
#[derive(Clone, Default)]
pub struct MockNode {
    pub driver: MockWifiDriver,
    pub broker: MockBroker,
    pub sensor: MockSensor,
    pub pin: RecordingPin,
    pub log: MemoryEventLog,
    pub timing: Timing,
}

impl MockNode {
    /// Node whose only network, "home", associates immediately
    pub fn new() -> Self {
        let node = Self::default();
        node.driver.connects_after("home", Duration::ZERO);
        node
    }

    pub fn networks() -> Vec<KnownNetwork> {
        vec![KnownNetwork::new("home", "pw1")]
    }

    pub fn event_log(&self) -> Arc<dyn EventLog> {
        Arc::new(self.log.clone())
    }

    pub fn link(&self) -> LinkSupervisor<MockWifiDriver> {
        LinkSupervisor::new(
            self.driver.clone(),
            self.timing.poll_interval,
            self.timing.initial_connect_timeout,
            self.event_log(),
        )
    }

    pub fn indicator(&self) -> StatusIndicator {
        StatusIndicator::new(Box::new(self.pin.clone()), self.timing.startup_display)
    }

    fn collaborators(
        &self,
        link: LinkSupervisor<MockWifiDriver>,
        broker: BrokerSupervisor<MockBroker>,
        sensor: Option<MockSensor>,
    ) -> Collaborators<MockWifiDriver, MockBroker, MockSensor> {
        Collaborators {
            link,
            broker,
            sensor,
            indicator: self.indicator(),
            event_log: self.event_log(),
        }
    }

    async fn connected_link(&self) -> (LinkSupervisor<MockWifiDriver>, ActiveNetwork) {
        let mut link = self.link();
        let active = link
            .connect_initial(&Self::networks())
            .await
            .unwrap_or_else(|e| panic!("mock link failed to connect: {e}"));
        (link, active)
    }

    async fn build(&self, with_session: bool, sensor: Option<MockSensor>) -> MockMachine {
        let (link, active) = self.connected_link().await;
        let mut broker = BrokerSupervisor::new(self.broker.clone(), self.event_log());
        let session = if with_session {
            Some(
                broker
                    .connect(&link)
                    .await
                    .unwrap_or_else(|e| panic!("mock broker failed to connect: {e}")),
            )
        } else {
            None
        };
        RecoveryStateMachine::new(
            self.collaborators(link, broker, sensor),
            TopicSet::default(),
            self.timing,
            active,
            session,
        )
    }

    /// Machine in Normal state with a live session and a working sensor
    pub async fn machine(&self) -> MockMachine {
        self.build(true, Some(self.sensor.clone())).await
    }

    /// Machine whose boot-time broker connect failed
    pub async fn machine_without_session(&self) -> MockMachine {
        self.build(false, Some(self.sensor.clone())).await
    }

    /// Machine whose sensor failed to start
    pub async fn machine_without_sensor(&self) -> MockMachine {
        self.build(true, None).await
    }
}
