//! OBD-II Polling

use obd_protocol::{ObdClient, ObdError, Pid};
use std::sync::Arc;
use std::time::Duration;
use telemetry_event::{EventClock, ObdReading};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Reads one partial-or-complete [`ObdReading`] per call
pub struct ObdPoller {
    client: ObdClient,
    clock: Arc<EventClock>,
    read_timeout: Duration,
    /// PIDs to ask for, learned once per adapter session
    supported: Option<Vec<Pid>>,
    /// Set while the adapter is gone, so the loss is reported once
    lost: bool,
}

impl ObdPoller {
    pub fn new(client: ObdClient, clock: Arc<EventClock>, read_timeout: Duration) -> Self {
        Self {
            client,
            clock,
            read_timeout,
            supported: None,
            lost: false,
        }
    }

    /// Query every supported parameter once.
    ///
    /// Only parameters that returned a valid value are set. A read that
    /// exceeds the timeout is treated as absent. `None` when nothing was read.
    pub async fn poll_obd(&mut self) -> Option<ObdReading> {
        if !self.client.is_connected() && !self.reconnect().await {
            return None;
        }

        let pids = self.supported_pids().await;
        let mut reading = ObdReading::new(self.clock.now());

        for pid in pids {
            match timeout(self.read_timeout, self.client.query_pid(pid)).await {
                Ok(Ok(response)) => set_field(&mut reading, pid, response.value),
                Ok(Err(e)) if e.is_disconnect() => {
                    self.mark_lost(&e);
                    break;
                }
                Ok(Err(ObdError::PidNotSupported(code))) => {
                    debug!("PID {:02X} returned no data", code);
                }
                Ok(Err(e)) => debug!("PID {:02X} read failed: {}", pid.as_hex(), e),
                Err(_) => {
                    debug!("PID {:02X} read timed out", pid.as_hex());
                    metrics::counter!("acquisition_read_timeouts_total").increment(1);
                }
            }
        }

        if reading.is_empty() {
            return None;
        }
        reading.timestamp = self.clock.now();
        Some(reading)
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    async fn reconnect(&mut self) -> bool {
        match timeout(self.read_timeout * 4, self.client.initialize()).await {
            Ok(Ok(())) => {
                info!("OBD adapter connected");
                self.lost = false;
                self.supported = None;
                true
            }
            Ok(Err(e)) => {
                self.mark_lost(&e);
                false
            }
            Err(_) => {
                self.mark_lost(&ObdError::Timeout(self.read_timeout.as_millis() as u64 * 4));
                self.client.disconnect().await;
                false
            }
        }
    }

    async fn supported_pids(&mut self) -> Vec<Pid> {
        if let Some(pids) = &self.supported {
            return pids.clone();
        }
        let pids = match timeout(self.read_timeout, self.client.supported_pids()).await {
            Ok(Ok(pids)) if !pids.is_empty() => pids,
            Ok(Ok(_)) => Pid::ALL.to_vec(),
            Ok(Err(e)) => {
                debug!("Supported PID query failed ({}), polling all", e);
                Pid::ALL.to_vec()
            }
            Err(_) => Pid::ALL.to_vec(),
        };
        info!("Polling {} OBD parameters", pids.len());
        self.supported = Some(pids.clone());
        pids
    }

    fn mark_lost(&mut self, error: &ObdError) {
        if !self.lost {
            warn!("OBD adapter unavailable: {}", error);
            metrics::counter!("acquisition_adapter_disconnects_total").increment(1);
            self.lost = true;
        }
        self.supported = None;
    }
}

fn set_field(reading: &mut ObdReading, pid: Pid, value: f64) {
    if !value.is_finite() {
        return;
    }
    let slot = match pid {
        Pid::Speed => &mut reading.speed,
        Pid::Rpm => &mut reading.rpm,
        Pid::CoolantTemp => &mut reading.coolant_temp,
        Pid::ThrottlePosition => &mut reading.throttle,
        Pid::EngineLoad => &mut reading.engine_load,
        Pid::FuelLevel => &mut reading.fuel_level,
    };
    *slot = Some(value);
}
