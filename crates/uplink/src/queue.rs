//! Per-kind Local Queue

use ring_buffer::BoundedQueue;
use std::collections::HashMap;
use telemetry_event::{EventKind, TelemetryEvent};
use tracing::warn;

/// A queued event and its arrival sequence number
#[derive(Debug, Clone, PartialEq)]
pub struct Queued {
    pub seq: u64,
    pub event: TelemetryEvent,
}

/// Bounded in-memory queue, FIFO per event kind.
///
/// Each kind has its own capacity so a burst of one kind never evicts
/// another. Pops follow arrival order across kinds.
#[derive(Debug)]
pub struct LocalQueue {
    capacity: usize,
    queues: HashMap<EventKind, BoundedQueue<Queued>>,
    next_seq: u64,
}

impl LocalQueue {
    /// Create a queue holding at most `capacity` events of each kind
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queues: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Enqueue an event, returning the event evicted to make room
    pub fn push(&mut self, event: TelemetryEvent) -> Option<TelemetryEvent> {
        let kind = event.kind();
        let seq = self.next_seq;
        self.next_seq += 1;

        let evicted = self.queue_mut(kind).push_back(Queued { seq, event })?;
        warn!("Uplink queue full for {}, dropped oldest event", kind);
        metrics::counter!("uplink_events_dropped_total", "kind" => kind.as_str()).increment(1);
        Some(evicted.event)
    }

    /// Put a popped event back at the head of its kind.
    ///
    /// Returns `false` when the kind filled up meanwhile; the event is then
    /// the oldest one and is dropped.
    pub fn requeue(&mut self, item: Queued) -> bool {
        let kind = item.event.kind();
        if self.queue_mut(kind).push_front(item).is_some() {
            warn!("Uplink queue full for {}, dropped requeued event", kind);
            metrics::counter!("uplink_events_dropped_total", "kind" => kind.as_str()).increment(1);
            return false;
        }
        true
    }

    /// Take the earliest-arrived event across all kinds
    pub fn pop(&mut self) -> Option<Queued> {
        let kind = self
            .queues
            .iter()
            .filter_map(|(kind, queue)| queue.front().map(|head| (head.seq, *kind)))
            .min_by_key(|(seq, _)| *seq)
            .map(|(_, kind)| kind)?;
        self.queues.get_mut(&kind)?.pop_front()
    }

    /// Total queued events
    pub fn len(&self) -> usize {
        self.queues.values().map(BoundedQueue::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queued events of one kind
    pub fn len_of(&self, kind: EventKind) -> usize {
        self.queues.get(&kind).map_or(0, BoundedQueue::len)
    }

    /// Events of one kind discarded on overflow
    pub fn dropped(&self, kind: EventKind) -> u64 {
        self.queues.get(&kind).map_or(0, BoundedQueue::dropped)
    }

    /// Events discarded on overflow, all kinds
    pub fn total_dropped(&self) -> u64 {
        self.queues.values().map(BoundedQueue::dropped).sum()
    }

    fn queue_mut(&mut self, kind: EventKind) -> &mut BoundedQueue<Queued> {
        let capacity = self.capacity;
        self.queues
            .entry(kind)
            .or_insert_with(|| BoundedQueue::new(capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use telemetry_event::{GpsFix, ObdReading};

    fn obd(rpm: f64) -> TelemetryEvent {
        let mut reading = ObdReading::new(Utc::now());
        reading.rpm = Some(rpm);
        reading.into()
    }

    fn gps(lat: f64) -> TelemetryEvent {
        GpsFix::new(Utc::now(), lat, 0.0).into()
    }

    fn rpm_of(item: &Queued) -> Option<f64> {
        match &item.event {
            TelemetryEvent::Obd(r) => r.rpm,
            _ => None,
        }
    }

    #[test]
    fn test_arrival_order_across_kinds() {
        let mut queue = LocalQueue::new(10);
        queue.push(obd(1.0));
        queue.push(gps(10.0));
        queue.push(obd(2.0));

        let kinds: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|q| q.event.kind())
            .collect();
        assert_eq!(kinds, vec![EventKind::Obd, EventKind::Gps, EventKind::Obd]);
    }

    #[test]
    fn test_requeued_event_keeps_its_place_across_kinds() {
        let mut queue = LocalQueue::new(10);
        queue.push(gps(10.0));
        queue.push(obd(1.0));
        queue.push(gps(20.0));

        let first = queue.pop().unwrap();
        assert_eq!(first.event.kind(), EventKind::Gps);
        assert!(queue.requeue(first.clone()));

        assert_eq!(queue.pop(), Some(first));
        assert_eq!(rpm_of(&queue.pop().unwrap()), Some(1.0));
        assert_eq!(queue.pop().map(|q| q.event.kind()), Some(EventKind::Gps));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_overflow_drops_oldest_of_same_kind() {
        let mut queue = LocalQueue::new(3);
        queue.push(gps(1.0));
        for rpm in 0..5 {
            queue.push(obd(rpm as f64));
        }

        assert_eq!(queue.len_of(EventKind::Obd), 3);
        assert_eq!(queue.len_of(EventKind::Gps), 1);
        assert_eq!(queue.dropped(EventKind::Obd), 2);
        assert_eq!(queue.dropped(EventKind::Gps), 0);

        queue.pop();
        let remaining: Vec<_> = std::iter::from_fn(|| queue.pop())
            .filter_map(|q| rpm_of(&q))
            .collect();
        assert_eq!(remaining, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_requeue_goes_first() {
        let mut queue = LocalQueue::new(5);
        queue.push(obd(1.0));
        queue.push(obd(2.0));

        let head = queue.pop().unwrap();
        assert!(queue.requeue(head));
        assert_eq!(rpm_of(&queue.pop().unwrap()), Some(1.0));
        assert_eq!(rpm_of(&queue.pop().unwrap()), Some(2.0));
    }

    #[test]
    fn test_requeue_on_full_kind_is_dropped() {
        let mut queue = LocalQueue::new(2);
        queue.push(obd(1.0));
        let head = queue.pop().unwrap();
        queue.push(obd(2.0));
        queue.push(obd(3.0));

        assert!(!queue.requeue(head));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.total_dropped(), 1);
    }
}
