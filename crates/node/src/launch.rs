//! Component Sets

use crate::settings::{CarSettings, GroundSettings, Settings};
use acquisition::{GpsPoller, ObdPoller};
use anyhow::{Context, Result};
use api::{install_metrics, run_server, AppState};
use hub::Hub;
use role::{Role, RoleError, RoleState};
use std::future::Future;
use std::sync::Arc;
use telemetry_event::EventClock;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uplink::{Ingress, Uplink};

/// What a node brings up for its role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentSet {
    /// Acquisition feeding the uplink
    Car,
    /// Hub behind the HTTP API
    Ground,
}

impl ComponentSet {
    /// Component set for a resolved role; an unset role is refused
    pub fn for_role(state: RoleState) -> Result<Self, RoleError> {
        Ok(match state.require()? {
            Role::Car => ComponentSet::Car,
            Role::Ground => ComponentSet::Ground,
        })
    }

    pub fn components(&self) -> &'static [&'static str] {
        match self {
            ComponentSet::Car => &["acquisition", "uplink"],
            ComponentSet::Ground => &["hub", "api"],
        }
    }
}

/// Resolve the role from `settings.role` and run its component set until
/// `shutdown` resolves. Nothing starts when the role is unset or invalid.
pub async fn launch<F>(settings: &Settings, shutdown: F) -> Result<ComponentSet>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = role::resolve(&settings.role).context("Failed to read node role")?;
    let set = ComponentSet::for_role(state).context("Refusing to start; set a role with pitlink-role")?;
    info!(
        "Node role: {}{}, starting {}",
        state,
        if state.is_dev() { " (development)" } else { "" },
        set.components().join(" + ")
    );

    match set {
        ComponentSet::Car => run_car(&settings.car, shutdown).await?,
        ComponentSet::Ground => run_ground(&settings.ground, shutdown).await?,
    }
    Ok(set)
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await
        }
    }
}

/// Acquisition and uplink, until `shutdown` resolves
pub async fn run_car<F: Future<Output = ()>>(settings: &CarSettings, shutdown: F) -> Result<()> {
    let acq = &settings.acquisition;
    let clock = Arc::new(EventClock::new());
    let ingress = Ingress::new(settings.uplink.queue_capacity);

    let uplink = Uplink::http(&settings.uplink, ingress.clone()).context("Failed to set up uplink")?;
    let stats = uplink.stats();

    let obd = ObdPoller::new(acq.build_obd(), Arc::clone(&clock), acq.read_timeout());
    let gps = acq
        .build_gps()
        .context("Failed to set up GPS source")?
        .map(|receiver| GpsPoller::new(receiver, Arc::clone(&clock), acq.read_timeout()));
    if gps.is_none() {
        info!("No GPS device or route configured, GPS disabled");
    }

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let uplink_task = tokio::spawn(uplink.run(async move {
        let _ = stop_rx.wait_for(|stopped| *stopped).await;
    }));

    acquisition::run(
        Some(obd),
        gps,
        acq.obd_interval(),
        acq.gps_interval(),
        ingress.clone(),
        shutdown,
    )
    .await;

    ingress.close();
    stop_tx.send_replace(true);
    uplink_task.await.context("Uplink task failed")?;

    info!(
        sent = stats.sent(),
        send_failures = stats.send_failures(),
        rejected = stats.rejected(),
        reconnects = stats.reconnects(),
        dropped = ingress.total_dropped(),
        unsent = ingress.len(),
        "Car node stopped"
    );
    Ok(())
}

/// Hub and HTTP API, until `shutdown` resolves
pub async fn run_ground<F>(settings: &GroundSettings, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let hub = Hub::new(settings.hub.clone());
    let mut state = AppState::new(Arc::clone(&hub));
    match install_metrics() {
        Ok(metrics) => state = state.with_metrics(metrics),
        Err(e) => warn!("Metrics disabled: {}", e),
    }
    let state = Arc::new(state);

    run_server(&settings.listen, state, shutdown)
        .await
        .with_context(|| format!("API server on {} failed", settings.listen))?;

    let stats = hub.stats();
    info!(
        ingested = stats.ingested,
        suspect = stats.suspect,
        lag_dropped = stats.lag_dropped,
        "Ground node stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use role::RoleConfig;
    use std::fs;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    /// Settings whose role files live in `dir`, with the uplink aimed at
    /// `ground_url` and the API bound to `listen`
    fn settings_in(dir: &TempDir, ground_url: String, listen: SocketAddr) -> Settings {
        let mut settings = Settings::default();
        settings.role = RoleConfig {
            production_file: dir.path().join("pi_role"),
            dev_file: dir.path().join(".pi_role"),
        };
        settings.car.uplink.ground_url = ground_url;
        settings.car.uplink.send_timeout_ms = 100;
        settings.ground.listen = listen.to_string();
        settings
    }

    async fn unused_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    async fn accepts_within(listener: &TcpListener, wait: Duration) -> bool {
        matches!(tokio::time::timeout(wait, listener.accept()).await, Ok(Ok(_)))
    }

    #[test]
    fn test_component_set_for_role() {
        assert_eq!(ComponentSet::for_role(RoleState::Car).unwrap(), ComponentSet::Car);
        assert_eq!(ComponentSet::for_role(RoleState::DevCar).unwrap(), ComponentSet::Car);
        assert_eq!(ComponentSet::for_role(RoleState::Ground).unwrap(), ComponentSet::Ground);
        assert_eq!(ComponentSet::for_role(RoleState::DevGround).unwrap(), ComponentSet::Ground);
        assert!(matches!(ComponentSet::for_role(RoleState::Unset), Err(RoleError::Unset)));
        assert_eq!(ComponentSet::Car.components(), &["acquisition", "uplink"]);
    }

    #[tokio::test]
    async fn test_car_role_starts_uplink_and_no_api() {
        let dir = TempDir::new().unwrap();
        let ground = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let listen = unused_addr().await;
        let settings = settings_in(&dir, format!("http://{}", ground.local_addr().unwrap()), listen);
        fs::write(&settings.role.production_file, "car").unwrap();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (result, (uplink_reached, api_up)) = tokio::join!(
            launch(&settings, async move {
                let _ = stop_rx.await;
            }),
            async {
                let uplink_reached = accepts_within(&ground, Duration::from_secs(5)).await;
                let api_up = TcpStream::connect(listen).await.is_ok();
                stop_tx.send(()).unwrap();
                (uplink_reached, api_up)
            }
        );

        assert_eq!(result.unwrap(), ComponentSet::Car);
        assert!(uplink_reached);
        assert!(!api_up);
    }

    #[tokio::test]
    async fn test_dev_ground_role_starts_api_and_no_uplink() {
        let dir = TempDir::new().unwrap();
        let car_target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let listen = unused_addr().await;
        let settings = settings_in(&dir, format!("http://{}", car_target.local_addr().unwrap()), listen);
        fs::write(&settings.role.production_file, "car").unwrap();
        fs::write(&settings.role.dev_file, "dev:ground").unwrap();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (result, (api_up, uplink_reached)) = tokio::join!(
            launch(&settings, async move {
                let _ = stop_rx.await;
            }),
            async {
                let mut api_up = false;
                for _ in 0..100 {
                    if TcpStream::connect(listen).await.is_ok() {
                        api_up = true;
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                let uplink_reached = accepts_within(&car_target, Duration::from_millis(300)).await;
                stop_tx.send(()).unwrap();
                (api_up, uplink_reached)
            }
        );

        assert_eq!(result.unwrap(), ComponentSet::Ground);
        assert!(api_up);
        assert!(!uplink_reached);
    }

    #[tokio::test]
    async fn test_unset_or_invalid_role_starts_nothing() {
        let dir = TempDir::new().unwrap();
        let ground = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let listen = unused_addr().await;
        let settings = settings_in(&dir, format!("http://{}", ground.local_addr().unwrap()), listen);

        let unset = tokio::time::timeout(
            Duration::from_secs(1),
            launch(&settings, std::future::pending::<()>()),
        )
        .await
        .expect("launch with no role must fail fast");
        assert!(matches!(unset.unwrap_err().downcast_ref::<RoleError>(), Some(RoleError::Unset)));

        fs::write(&settings.role.production_file, "boat").unwrap();
        let invalid = tokio::time::timeout(
            Duration::from_secs(1),
            launch(&settings, std::future::pending::<()>()),
        )
        .await
        .expect("launch with an invalid role must fail fast");
        assert!(matches!(
            invalid.unwrap_err().downcast_ref::<RoleError>(),
            Some(RoleError::Invalid { .. })
        ));

        assert!(!accepts_within(&ground, Duration::from_millis(200)).await);
        assert!(TcpStream::connect(listen).await.is_err());
    }

    #[tokio::test]
    async fn test_car_node_stops_on_shutdown_with_ground_unreachable() {
        let mut settings = CarSettings::default();
        // Nothing listens on the discard port
        settings.uplink.ground_url = "http://127.0.0.1:9".to_string();
        settings.uplink.send_timeout_ms = 100;

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_car(&settings, tokio::time::sleep(Duration::from_millis(300))),
        )
        .await;

        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_car_node_rejects_bad_ground_url() {
        let mut settings = CarSettings::default();
        settings.uplink.ground_url = "not a url".to_string();

        assert!(run_car(&settings, std::future::ready(())).await.is_err());
    }
}
