//! Uplink State Machine

use crate::backoff::Backoff;
use crate::error::UplinkError;
use crate::ingress::Ingress;
use crate::link::{HttpLink, Link, LinkState};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the uplink transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UplinkConfig {
    /// Base URL of the ground station
    pub ground_url: String,
    /// Maximum pending events per kind
    pub queue_capacity: usize,
    /// Per-request timeout in milliseconds
    pub send_timeout_ms: u64,
    /// First reconnect delay in milliseconds
    pub backoff_initial_ms: u64,
    /// Reconnect delay ceiling in milliseconds
    pub backoff_max_ms: u64,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            ground_url: "http://localhost:5000".to_string(),
            queue_capacity: 300,
            send_timeout_ms: 2000,
            backoff_initial_ms: 1000,
            backoff_max_ms: 30_000,
        }
    }
}

impl UplinkConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.backoff_initial_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }
}

/// Counters readable while the uplink runs
#[derive(Debug, Default)]
pub struct UplinkStats {
    sent: AtomicU64,
    send_failures: AtomicU64,
    rejected: AtomicU64,
    reconnects: AtomicU64,
    state: AtomicU8,
}

impl UplinkStats {
    /// Events delivered
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Sends that failed and were requeued
    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    /// Events the ground station refused for good; dropped, not retried
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Successful connects after the first one
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> LinkState {
        match self.state.load(Ordering::Relaxed) {
            1 => LinkState::Connecting,
            2 => LinkState::Connected,
            _ => LinkState::Disconnected,
        }
    }

    fn set_state(&self, state: LinkState) {
        let raw = match state {
            LinkState::Disconnected => 0,
            LinkState::Connecting => 1,
            LinkState::Connected => 2,
        };
        self.state.store(raw, Ordering::Relaxed);
    }
}

/// Drains the ingress over a [`Link`], reconnecting with backoff
pub struct Uplink<L: Link> {
    link: L,
    ingress: Ingress,
    backoff: Backoff,
    state: LinkState,
    /// The last send failed; a passing health probe alone does not clear
    /// the backoff then
    send_failing: bool,
    stats: Arc<UplinkStats>,
}

impl Uplink<HttpLink> {
    /// Uplink over HTTP to `config.ground_url`
    pub fn http(config: &UplinkConfig, ingress: Ingress) -> Result<Self, UplinkError> {
        let link = HttpLink::new(
            &config.ground_url,
            Duration::from_millis(config.send_timeout_ms),
        )?;
        info!("Uplink targeting {}", config.ground_url);
        Ok(Self::new(link, ingress, config.backoff()))
    }
}

impl<L: Link> Uplink<L> {
    pub fn new(link: L, ingress: Ingress, backoff: Backoff) -> Self {
        Self {
            link,
            ingress,
            backoff,
            state: LinkState::Disconnected,
            send_failing: false,
            stats: Arc::new(UplinkStats::default()),
        }
    }

    /// Shared counters
    pub fn stats(&self) -> Arc<UplinkStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Run until `shutdown` resolves or the ingress is closed and drained.
    ///
    /// Link faults never end the loop; they only move the state machine
    /// back to `Disconnected` and arm the backoff timer.
    pub async fn run<F: Future<Output = ()>>(mut self, shutdown: F) {
        tokio::pin!(shutdown);
        info!("Uplink started");
        let mut connected_once = false;

        loop {
            match self.state {
                LinkState::Disconnected => self.set_state(LinkState::Connecting),
                LinkState::Connecting => {
                    let result = tokio::select! {
                        _ = &mut shutdown => break,
                        result = self.link.connect() => result,
                    };
                    match result {
                        Ok(()) => {
                            if connected_once {
                                self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
                                metrics::counter!("uplink_reconnects_total").increment(1);
                            }
                            connected_once = true;
                            if !self.send_failing {
                                self.backoff.reset();
                            }
                            self.set_state(LinkState::Connected);
                            info!("Uplink connected, {} events queued", self.ingress.len());
                        }
                        Err(e) => {
                            if !self.wait_backoff(&e, shutdown.as_mut()).await {
                                break;
                            }
                        }
                    }
                }
                LinkState::Connected => {
                    let item = tokio::select! {
                        _ = &mut shutdown => break,
                        item = self.ingress.next() => item,
                    };
                    let Some(item) = item else {
                        debug!("Uplink ingress closed");
                        break;
                    };

                    let result = tokio::select! {
                        _ = &mut shutdown => {
                            self.ingress.requeue(item);
                            break;
                        }
                        result = self.link.send(&item.event) => result,
                    };
                    match result {
                        Ok(()) => {
                            self.send_failing = false;
                            self.backoff.reset();
                            self.stats.sent.fetch_add(1, Ordering::Relaxed);
                            metrics::counter!("uplink_events_sent_total").increment(1);
                        }
                        Err(e) if e.is_permanent() => {
                            warn!("Ground station rejected {} event, dropping it: {}", item.event.kind(), e);
                            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                            metrics::counter!("uplink_events_rejected_total").increment(1);
                        }
                        Err(e) => {
                            self.send_failing = true;
                            self.stats.send_failures.fetch_add(1, Ordering::Relaxed);
                            self.ingress.requeue(item);
                            if !self.wait_backoff(&e, shutdown.as_mut()).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        self.set_state(LinkState::Disconnected);
        info!(
            "Uplink stopped: {} sent, {} pending, {} dropped",
            self.stats.sent(),
            self.ingress.len(),
            self.ingress.total_dropped()
        );
    }

    /// Go to `Disconnected` and sleep; `false` if shutdown fired meanwhile
    async fn wait_backoff<F: Future<Output = ()>>(
        &mut self,
        error: &UplinkError,
        shutdown: Pin<&mut F>,
    ) -> bool {
        self.set_state(LinkState::Disconnected);
        let delay = self.backoff.next_delay();
        warn!(
            "Uplink down ({}), retry {} in {:?}",
            error,
            self.backoff.consecutive_failures(),
            delay
        );
        tokio::select! {
            _ = shutdown => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn set_state(&mut self, state: LinkState) {
        if self.state != state {
            debug!("Uplink {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.stats.set_state(state);
    }
}
