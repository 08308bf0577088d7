//! Producer-facing Ingress Handle

use crate::queue::{LocalQueue, Queued};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use telemetry_event::{EventKind, TelemetryEvent};
use tokio::sync::Notify;
use tracing::debug;

struct Shared {
    queue: Mutex<LocalQueue>,
    notify: Notify,
    closed: AtomicBool,
}

/// Cloneable handle onto the uplink's [`LocalQueue`].
///
/// Pushing never blocks and never fails: a full kind evicts its oldest
/// pending event.
#[derive(Clone)]
pub struct Ingress {
    shared: Arc<Shared>,
}

impl Ingress {
    /// Create an ingress holding at most `capacity` events per kind
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(LocalQueue::new(capacity)),
                notify: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Enqueue an event for sending
    pub fn push(&self, event: impl Into<TelemetryEvent>) {
        let event = event.into();
        if event.kind() == EventKind::Connected {
            debug!("Ignoring connected marker on uplink ingress");
            return;
        }
        self.queue().push(event);
        self.shared.notify.notify_one();
    }

    /// Return an unsent event to the head of its kind
    pub fn requeue(&self, item: Queued) -> bool {
        let kept = self.queue().requeue(item);
        if kept {
            self.shared.notify.notify_one();
        }
        kept
    }

    /// Take the next event without waiting
    pub fn try_next(&self) -> Option<Queued> {
        self.queue().pop()
    }

    /// Wait for the next event; `None` once closed and drained
    pub async fn next(&self) -> Option<Queued> {
        loop {
            if let Some(item) = self.try_next() {
                return Some(item);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }
            self.shared.notify.notified().await;
        }
    }

    /// Stop accepting waits; pending events can still be drained
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_waiters();
        self.shared.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Pending events, all kinds
    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending events of one kind
    pub fn len_of(&self, kind: EventKind) -> usize {
        self.queue().len_of(kind)
    }

    /// Events of one kind dropped on overflow
    pub fn dropped(&self, kind: EventKind) -> u64 {
        self.queue().dropped(kind)
    }

    /// Events dropped on overflow, all kinds
    pub fn total_dropped(&self) -> u64 {
        self.queue().total_dropped()
    }

    fn queue(&self) -> MutexGuard<'_, LocalQueue> {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use telemetry_event::{ConnectedMarker, ObdReading};

    #[tokio::test]
    async fn test_next_wakes_on_push() {
        let ingress = Ingress::new(10);
        let consumer = ingress.clone();
        let task = tokio::spawn(async move { consumer.next().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        ingress.push(ObdReading::new(Utc::now()));

        let item = task.await.unwrap().unwrap();
        assert_eq!(item.event.kind(), EventKind::Obd);
    }

    #[tokio::test]
    async fn test_close_ends_waiters() {
        let ingress = Ingress::new(10);
        let consumer = ingress.clone();
        let task = tokio::spawn(async move { consumer.next().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        ingress.close();
        assert!(task.await.unwrap().is_none());
    }

    #[test]
    fn test_connected_markers_are_not_queued() {
        let ingress = Ingress::new(10);
        ingress.push(TelemetryEvent::Connected(ConnectedMarker::new(Utc::now())));
        assert!(ingress.is_empty());
    }
}
