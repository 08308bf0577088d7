//! Acquisition Configuration

use gps_receiver::{GpsError, GpsReceiver, RouteSimulator};
use obd_protocol::{ObdClient, ObdProtocol};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Configuration for the polling loops and their sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// OBD poll period in milliseconds
    pub obd_interval_ms: u64,
    /// GPS poll period in milliseconds
    pub gps_interval_ms: u64,
    /// Upper bound on any single adapter or receiver read
    pub read_timeout_ms: u64,
    /// ELM327 serial device, or `tcp://host:port` for a Wi-Fi adapter; the
    /// simulated adapter is used when unset
    pub obd_device: Option<String>,
    pub obd_baud_rate: u32,
    /// Bus protocol, `auto` lets the adapter search
    pub obd_protocol: ObdProtocol,
    /// NMEA serial device
    pub gps_device: Option<String>,
    pub gps_baud_rate: u32,
    /// GeoJSON route replayed when no GPS device is configured
    pub gps_route: Option<PathBuf>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            obd_interval_ms: 1000,
            gps_interval_ms: 1000,
            read_timeout_ms: 2000,
            obd_device: None,
            obd_baud_rate: 38400,
            obd_protocol: ObdProtocol::Auto,
            gps_device: None,
            gps_baud_rate: 9600,
            gps_route: None,
        }
    }
}

impl AcquisitionConfig {
    pub fn obd_interval(&self) -> Duration {
        Duration::from_millis(self.obd_interval_ms.max(1))
    }

    pub fn gps_interval(&self) -> Duration {
        Duration::from_millis(self.gps_interval_ms.max(1))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    /// OBD client for the configured device, or the simulated adapter
    pub fn build_obd(&self) -> ObdClient {
        match &self.obd_device {
            Some(device) => {
                let mut client =
                    ObdClient::new(device, self.obd_baud_rate).with_protocol(self.obd_protocol);
                client.set_timeout(self.read_timeout());
                client
            }
            None => {
                info!("No OBD device configured, using simulated adapter");
                ObdClient::mock()
            }
        }
    }

    /// GPS receiver for the configured device or route; `None` disables GPS
    pub fn build_gps(&self) -> Result<Option<GpsReceiver>, GpsError> {
        if let Some(device) = &self.gps_device {
            return Ok(Some(GpsReceiver::serial(device, self.gps_baud_rate)));
        }
        if let Some(path) = &self.gps_route {
            let simulator = RouteSimulator::load(path, self.gps_interval())?;
            info!(
                "Replaying GPS route {} ({} points)",
                path.display(),
                simulator.len()
            );
            return Ok(Some(GpsReceiver::route(simulator)));
        }
        Ok(None)
    }
}
