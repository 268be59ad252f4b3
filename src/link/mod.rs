//! Wireless link supervision
//!
//! Owns the station-mode network connection. Initial connect walks the whole
//! list of known networks; later recovery only retries the network that
//! worked, because it is very likely to work again and a full rescan on
//! every drop costs time the operator sees as error cycles.

pub mod tcp_probe;

pub use tcp_probe::TcpProbeDriver;

use crate::config::KnownNetwork;
use crate::error::ErrorCode;
use crate::event_log::EventLog;
use crate::indicator::StatusIndicator;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

/// Link failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LinkError {
    #[error("No known networks configured")]
    NoCandidates,
    #[error("All {tried} known networks exhausted")]
    AllCandidatesExhausted { tried: usize },
    #[error("Reconnect to {ssid} timed out after {timeout:?}")]
    ReconnectTimeout { ssid: String, timeout: Duration },
    #[error("Network driver error: {0}")]
    Driver(String),
}

/// Coarse driver status, reported in diagnostics when a join stalls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    Connecting,
    NoApFound,
    ConnectFailed,
    GotIp,
}

/// Radio / network interface driver
#[async_trait]
pub trait WifiDriver: Send {
    /// Bring the interface up in station mode
    async fn activate(&mut self) -> Result<(), LinkError>;

    /// Initiate association with `network`. Returns once the request is
    /// issued, not when the link is up.
    async fn join(&mut self, network: &KnownNetwork) -> Result<(), LinkError>;

    /// Non-blocking health query
    async fn is_connected(&self) -> bool;

    async fn status(&self) -> LinkStatus;
}

/// The network that last reached the connected state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveNetwork {
    pub network: KnownNetwork,
    /// Position in the configured candidate list
    pub index: usize,
}

impl ActiveNetwork {
    pub fn ssid(&self) -> &str {
        &self.network.ssid
    }
}

/// Poll `driver` every `poll_interval` until it reports connected or
/// `timeout` elapses. Shared by the initial scan and recovery paths.
pub async fn poll_until_connected<D: WifiDriver + ?Sized>(
    driver: &D,
    timeout: Duration,
    poll_interval: Duration,
    mut indicator: Option<&mut StatusIndicator>,
) -> bool {
    let start = Instant::now();
    loop {
        if driver.is_connected().await {
            return true;
        }
        if start.elapsed() > timeout {
            return false;
        }
        // The link code runs while the attempt is still in progress
        if let Some(indicator) = indicator.as_deref_mut() {
            indicator.error_pattern(ErrorCode::Link).await;
        }
        sleep(poll_interval).await;
    }
}

/// Supervises the wireless link
pub struct LinkSupervisor<D: WifiDriver> {
    driver: D,
    poll_interval: Duration,
    initial_timeout: Duration,
    event_log: Arc<dyn EventLog>,
}

impl<D: WifiDriver> LinkSupervisor<D> {
    pub fn new(
        driver: D,
        poll_interval: Duration,
        initial_timeout: Duration,
        event_log: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            driver,
            poll_interval,
            initial_timeout,
            event_log,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Try each candidate in order; the first to reach connected wins
    pub async fn connect_initial(
        &mut self,
        candidates: &[KnownNetwork],
    ) -> Result<ActiveNetwork, LinkError> {
        if candidates.is_empty() {
            return Err(LinkError::NoCandidates);
        }

        self.driver.activate().await?;

        for (index, network) in candidates.iter().enumerate() {
            info!(ssid = %network.ssid, "Trying to connect");

            if let Err(e) = self.driver.join(network).await {
                warn!(ssid = %network.ssid, error = %e, "Join request failed");
                continue;
            }

            if poll_until_connected(&self.driver, self.initial_timeout, self.poll_interval, None)
                .await
            {
                info!(ssid = %network.ssid, "Successfully connected");
                return Ok(ActiveNetwork {
                    network: network.clone(),
                    index,
                });
            }

            let status = self.driver.status().await;
            warn!(
                ssid = %network.ssid,
                status = ?status,
                "Timeout after {:?} connecting",
                self.initial_timeout
            );
        }

        let error = LinkError::AllCandidatesExhausted {
            tried: candidates.len(),
        };
        self.event_log
            .append("WiFi connection failed - all networks exhausted");
        Err(error)
    }

    pub async fn is_connected(&self) -> bool {
        self.driver.is_connected().await
    }

    /// Re-join the previously successful network only. `indicator` shows
    /// the link error pattern between polls.
    pub async fn reconnect(
        &mut self,
        active: &ActiveNetwork,
        timeout: Duration,
        indicator: &mut StatusIndicator,
    ) -> Result<(), LinkError> {
        let ssid = active.ssid();
        debug!(ssid = %ssid, "Reconnect attempt");

        if let Err(e) = self.driver.join(&active.network).await {
            self.event_log
                .append(&format!("WiFi reconnection error: {e}"));
            return Err(e);
        }

        let connected =
            poll_until_connected(&self.driver, timeout, self.poll_interval, Some(indicator)).await;
        if connected {
            info!(ssid = %ssid, "WiFi reconnected successfully");
            Ok(())
        } else {
            self.event_log
                .append(&format!("WiFi reconnection failed to {ssid}"));
            Err(LinkError::ReconnectTimeout {
                ssid: ssid.to_string(),
                timeout,
            })
        }
    }
}
