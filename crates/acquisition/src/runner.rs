//! Polling Loops

use crate::{GpsPoller, ObdPoller};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;
use uplink::Ingress;

/// Run the OBD and GPS loops concurrently until `shutdown` resolves.
///
/// Each loop ticks on its own period; a slow read in one never delays
/// the other. Emitted events go to `ingress`.
pub async fn run<F: Future<Output = ()>>(
    obd: Option<ObdPoller>,
    gps: Option<GpsPoller>,
    obd_interval: Duration,
    gps_interval: Duration,
    ingress: Ingress,
    shutdown: F,
) {
    let obd_ingress = ingress.clone();
    let obd_loop = async move {
        let Some(mut poller) = obd else {
            return std::future::pending::<()>().await;
        };
        info!("OBD polling every {:?}", obd_interval);
        let mut ticker = interval(obd_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(reading) = poller.poll_obd().await {
                obd_ingress.push(reading);
            }
        }
    };

    let gps_loop = async move {
        let Some(mut poller) = gps else {
            return std::future::pending::<()>().await;
        };
        info!("GPS polling every {:?}", gps_interval);
        let mut ticker = interval(gps_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(fix) = poller.poll_gps().await {
                ingress.push(fix);
            }
        }
    };

    tokio::select! {
        _ = shutdown => info!("Acquisition stopped"),
        _ = async { tokio::join!(obd_loop, gps_loop) } => {}
    }
}
