//! Ground Station API Server
//!
//! HTTP surface of the ground node: event ingest from the car, the live
//! event stream for dashboards, and read-only diagnostics.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use hub::{Hub, HubStats};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod error;
mod routes;

pub use error::ApiError;

/// Application state shared across handlers
pub struct AppState {
    pub hub: Arc<Hub>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    /// Prometheus renderer, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Create new application state
    pub fn new(hub: Arc<Hub>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            hub,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics: None,
            shutdown,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// End every open event stream
    pub fn close_streams(&self) {
        self.shutdown.send_replace(true);
    }

    /// Resolves once [`AppState::close_streams`] has been called
    pub(crate) fn streams_closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown.subscribe();
        async move {
            let _ = rx.wait_for(|closed| *closed).await;
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub hub: HubStats,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/data", post(routes::ingest::post_data))
        .route("/events", get(routes::events::stream))
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/echo", post(routes::echo::echo))
        .route("/api/v1/history/:class", get(routes::history::get_history))
        .route("/api/v1/subscribers", get(routes::history::get_subscribers))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        hub: state.hub.stats(),
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or_else(|| ApiError::NotFound("metrics recorder not installed".to_string()))
}

/// Initialize logging
///
/// `level` is one of `trace`, `debug`, `info`, `warn`, `error`.
pub fn init_logging(level: &str, json: bool) -> Result<(), ApiError> {
    let level: Level = level
        .parse()
        .map_err(|_| ApiError::Logging(format!("unknown log level '{}'", level)))?;
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| ApiError::Logging(e.to_string()))
}

/// Install the global Prometheus recorder
pub fn install_metrics() -> Result<PrometheusHandle, ApiError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ApiError::Metrics(e.to_string()))
}

/// Serve on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Starting API server on {}", listener.local_addr()?);
    let app = create_router(Arc::clone(&state));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            state.close_streams();
        })
        .await?;

    info!("API server stopped");
    Ok(())
}

/// Bind `addr` and serve until `shutdown` resolves
pub async fn run_server<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}
