//! GPS Polling

use gps_receiver::{GpsReceiver, PositionSample};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use telemetry_event::{EventClock, GpsFix};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Turns receiver samples into [`GpsFix`] events
pub struct GpsPoller {
    receiver: GpsReceiver,
    clock: Arc<EventClock>,
    read_timeout: Duration,
    lost: bool,
}

impl GpsPoller {
    pub fn new(receiver: GpsReceiver, clock: Arc<EventClock>, read_timeout: Duration) -> Self {
        Self {
            receiver,
            clock,
            read_timeout,
            lost: false,
        }
    }

    /// Read one sample; `None` unless it carries an in-range position
    pub async fn poll_gps(&mut self) -> Option<GpsFix> {
        let sample = match timeout(self.read_timeout, self.receiver.read_sample()).await {
            Ok(Ok(Some(sample))) => sample,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => {
                if !self.lost {
                    warn!("GPS receiver unavailable: {}", e);
                    metrics::counter!("acquisition_adapter_disconnects_total").increment(1);
                    self.lost = true;
                }
                return None;
            }
            Err(_) => {
                debug!("GPS read timed out");
                metrics::counter!("acquisition_read_timeouts_total").increment(1);
                return None;
            }
        };

        if self.lost {
            info!("GPS receiver back");
            self.lost = false;
        }
        self.to_fix(sample)
    }

    fn to_fix(&self, sample: PositionSample) -> Option<GpsFix> {
        let (Some(latitude), Some(longitude)) = (sample.latitude, sample.longitude) else {
            debug!("GPS sample without a position");
            return None;
        };

        let mut fix = GpsFix::new(self.clock.now(), latitude, longitude);
        if !fix.has_valid_position() {
            debug!("GPS position out of range: {}, {}", latitude, longitude);
            return None;
        }

        fix.altitude = sample.altitude.filter(|v| v.is_finite());
        fix.speed = sample.speed.filter(|v| v.is_finite());
        fix.heading = sample
            .heading
            .filter(|h| h.is_finite() && (0.0..=360.0).contains(h));
        if let Some(satellites) = sample.satellites {
            fix.extra.insert("satellites".into(), Value::from(satellites));
        }
        if let Some(hdop) = sample.hdop {
            fix.extra.insert("hdop".into(), Value::from(hdop));
        }
        Some(fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gps_receiver::RouteSimulator;

    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
    const VOID: &str = "$GNRMC,001031.00,V,,,,,,,060180,,,N";

    fn poller(receiver: GpsReceiver) -> GpsPoller {
        GpsPoller::new(receiver, Arc::new(EventClock::new()), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_fix_carries_receiver_extras() {
        let mut poller = poller(GpsReceiver::replay([GGA, RMC]));
        let fix = poller.poll_gps().await.unwrap();
        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        assert_eq!(fix.altitude, Some(545.4));
        assert_eq!(fix.extra["satellites"], 8);
        assert_eq!(fix.extra["hdop"], 0.9);
    }

    #[tokio::test]
    async fn test_no_fix_emits_nothing() {
        let mut poller = poller(GpsReceiver::replay([VOID]));
        assert!(poller.poll_gps().await.is_none());
        // Exhausted replay
        assert!(poller.poll_gps().await.is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_route_point_is_skipped() {
        let sim = RouteSimulator::new(
            vec![(38.16, -122.45), (200.0, -122.45)],
            Duration::from_secs(1),
        )
        .unwrap();
        let mut poller = poller(GpsReceiver::route(sim));
        assert!(poller.poll_gps().await.is_some());
        assert!(poller.poll_gps().await.is_none());
        assert!(poller.poll_gps().await.is_some());
    }

    #[tokio::test]
    async fn test_unavailable_device_emits_nothing() {
        let mut poller = poller(GpsReceiver::serial("/dev/does-not-exist", 9600));
        assert!(poller.poll_gps().await.is_none());
        assert!(poller.lost);
    }
}
