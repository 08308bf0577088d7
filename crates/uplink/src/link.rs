//! Transport Links

use crate::error::UplinkError;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use telemetry_event::TelemetryEvent;
use tracing::debug;

/// Connection state of the uplink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// A way of getting events to the ground station
pub trait Link: Send {
    /// Establish (or probe) the link
    fn connect(&mut self) -> impl Future<Output = Result<(), UplinkError>> + Send;

    /// Deliver one event
    fn send(&mut self, event: &TelemetryEvent) -> impl Future<Output = Result<(), UplinkError>> + Send;
}

/// HTTP link: `GET /api/v1/health` to connect, `POST /data` per event
pub struct HttpLink {
    client: reqwest::Client,
    health_url: String,
    data_url: String,
}

impl HttpLink {
    /// Create a link to `ground_url`, e.g. `http://192.168.4.1:5000`
    pub fn new(ground_url: &str, timeout: Duration) -> Result<Self, UplinkError> {
        let base = ground_url.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(UplinkError::InvalidUrl(ground_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            health_url: format!("{}/api/v1/health", base),
            data_url: format!("{}/data", base),
        })
    }
}

impl Link for HttpLink {
    async fn connect(&mut self) -> Result<(), UplinkError> {
        let response = self.client.get(&self.health_url).send().await?;
        if !response.status().is_success() {
            return Err(UplinkError::Status(response.status().as_u16()));
        }
        debug!("Ground station reachable at {}", self.health_url);
        Ok(())
    }

    async fn send(&mut self, event: &TelemetryEvent) -> Result<(), UplinkError> {
        let response = self.client.post(&self.data_url).json(event).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UplinkError::Status(status.as_u16()));
        }
        Ok(())
    }
}
