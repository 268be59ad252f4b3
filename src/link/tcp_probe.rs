//! Host network driver
//!
//! A host has no radio to associate, so "connected" is judged by whether a
//! TCP probe to the configured local endpoint (normally the gateway)
//! succeeds. The broker is never the probe target, so a broker outage stays
//! a broker outage.

use super::{LinkError, LinkStatus, WifiDriver};
use crate::config::KnownNetwork;
use async_trait::async_trait;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

pub struct TcpProbeDriver {
    probe_addr: String,
    probe_timeout: Duration,
    joined: Option<String>,
}

impl TcpProbeDriver {
    pub fn new(probe_addr: impl Into<String>, probe_timeout: Duration) -> Self {
        Self {
            probe_addr: probe_addr.into(),
            probe_timeout,
            joined: None,
        }
    }

    pub fn probe_addr(&self) -> &str {
        &self.probe_addr
    }

    async fn probe(&self) -> bool {
        matches!(
            timeout(self.probe_timeout, TcpStream::connect(&self.probe_addr)).await,
            Ok(Ok(_))
        )
    }
}

#[async_trait]
impl WifiDriver for TcpProbeDriver {
    async fn activate(&mut self) -> Result<(), LinkError> {
        lookup_host(self.probe_addr.as_str()).await.map_err(|e| {
            LinkError::Driver(format!("cannot resolve probe address {}: {e}", self.probe_addr))
        })?;
        debug!(probe = %self.probe_addr, "Host network interface ready");
        Ok(())
    }

    async fn join(&mut self, network: &KnownNetwork) -> Result<(), LinkError> {
        info!(ssid = %network.ssid, "Host join (network selection is simulated)");
        self.joined = Some(network.ssid.clone());
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.joined.is_some() && self.probe().await
    }

    async fn status(&self) -> LinkStatus {
        match &self.joined {
            None => LinkStatus::Idle,
            Some(_) if self.probe().await => LinkStatus::GotIp,
            Some(_) => LinkStatus::ConnectFailed,
        }
    }
}
