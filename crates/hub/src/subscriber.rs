//! Subscriber Handles

use crate::delivery::{Delivery, Message};
use crate::hub::Hub;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Notify;
use tracing::warn;

/// Per-subscriber bookkeeping shared with the hub's registry
#[derive(Debug)]
pub(crate) struct SubscriberState {
    id: u64,
    connected_at: DateTime<Utc>,
    alive: AtomicBool,
    /// Wakes a pending `recv` when the subscriber is released
    released: Notify,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl SubscriberState {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            connected_at: Utc::now(),
            alive: AtomicBool::new(true),
            released: Notify::new(),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub(crate) fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
        // notify_one keeps a permit when no recv is waiting yet
        self.released.notify_one();
    }

    pub(crate) fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn info(&self) -> SubscriberInfo {
        SubscriberInfo {
            id: self.id,
            connected_at: self.connected_at,
            alive: self.alive.load(Ordering::Acquire),
            delivered: self.delivered(),
            dropped: self.dropped(),
        }
    }
}

/// Diagnostics view of one subscriber
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberInfo {
    pub id: u64,
    pub connected_at: DateTime<Utc>,
    pub alive: bool,
    /// Messages handed to the connection
    pub delivered: u64,
    /// Messages lost because the subscriber fell behind
    pub dropped: u64,
}

/// A live subscription; dropping it unregisters the subscriber
pub struct Subscription {
    hub: Arc<Hub>,
    state: Arc<SubscriberState>,
    receiver: broadcast::Receiver<Arc<Delivery>>,
    marker: Option<Message>,
}

impl Subscription {
    pub(crate) fn new(
        hub: Arc<Hub>,
        state: Arc<SubscriberState>,
        receiver: broadcast::Receiver<Arc<Delivery>>,
        marker: Message,
    ) -> Self {
        Self {
            hub,
            state,
            receiver,
            marker: Some(marker),
        }
    }

    pub fn id(&self) -> u64 {
        self.state.id
    }

    pub fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::Acquire)
    }

    pub fn info(&self) -> SubscriberInfo {
        self.state.info()
    }

    /// Next message; `None` once unsubscribed or the hub is gone. A call
    /// already waiting returns as soon as the subscriber is released.
    ///
    /// Falling behind skips the oldest undelivered messages and counts them.
    pub async fn recv(&mut self) -> Option<Message> {
        if let Some(marker) = self.marker.take() {
            self.state.delivered.fetch_add(1, Ordering::Relaxed);
            return Some(marker);
        }

        loop {
            if !self.is_alive() {
                return None;
            }
            let result = tokio::select! {
                biased;
                _ = self.state.released.notified() => return None,
                result = self.receiver.recv() => result,
            };
            match result {
                Ok(delivery) => {
                    if !self.is_alive() {
                        return None;
                    }
                    self.state.delivered.fetch_add(1, Ordering::Relaxed);
                    return Some(Message::Event(delivery));
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("Subscriber {} lagging, dropped {} messages", self.state.id, missed);
                    self.state.dropped.fetch_add(missed, Ordering::Relaxed);
                    self.hub.lag_dropped.fetch_add(missed, Ordering::Relaxed);
                    metrics::counter!("hub_subscriber_lag_dropped_total").increment(missed);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Unregister now rather than on drop
    pub fn close(&self) -> bool {
        self.hub.unsubscribe(self.state.id)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.state.id);
    }
}
