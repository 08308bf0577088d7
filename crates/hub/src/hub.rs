//! Hub Implementation

use crate::delivery::{Delivery, HistoryClass, Message};
use crate::error::HubError;
use crate::subscriber::{SubscriberInfo, SubscriberState, Subscription};
use chrono::{DateTime, Utc};
use data_validator::{Validation, ValidationConfig, ValidationError, Validator};
use ring_buffer::{BufferStats, RingBuffer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use telemetry_event::{ConnectedMarker, EventClock, EventKind, KindTag, RawEvent, TelemetryEvent};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Configuration for the hub
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Retained OBD-class events
    pub obd_history: usize,
    /// Retained GPS events
    pub gps_history: usize,
    /// Undelivered messages a subscriber may fall behind by
    pub subscriber_capacity: usize,
    pub validation: ValidationConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            obd_history: 100,
            gps_history: 1000,
            subscriber_capacity: 100,
            validation: ValidationConfig::default(),
        }
    }
}

/// Counters for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub ingested: u64,
    pub suspect: u64,
    pub subscribers: usize,
    pub lag_dropped: u64,
    pub uptime_seconds: u64,
    pub obd_history: BufferStats,
    pub gps_history: BufferStats,
}

/// State owned by the single ingest writer
#[derive(Default)]
struct IngestState {
    next_seq: u64,
    last_timestamp: HashMap<HistoryClass, DateTime<Utc>>,
}

/// Ingest point and fan-out for one telemetry stream
pub struct Hub {
    validator: Validator,
    ingest: Mutex<IngestState>,
    obd_history: RingBuffer<Arc<Delivery>>,
    gps_history: RingBuffer<Arc<Delivery>>,
    sender: broadcast::Sender<Arc<Delivery>>,
    subscribers: Mutex<HashMap<u64, Arc<SubscriberState>>>,
    next_subscriber: AtomicU64,
    clock: EventClock,
    ingested: AtomicU64,
    suspect: AtomicU64,
    pub(crate) lag_dropped: AtomicU64,
    started: Instant,
}

impl Hub {
    pub fn new(config: HubConfig) -> Arc<Self> {
        let (sender, _) = broadcast::channel(config.subscriber_capacity.max(1));
        info!(
            "Hub created: history obd={} gps={}, subscriber capacity {}",
            config.obd_history, config.gps_history, config.subscriber_capacity
        );
        Arc::new(Self {
            validator: Validator::new(config.validation),
            ingest: Mutex::new(IngestState::default()),
            obd_history: RingBuffer::new(config.obd_history),
            gps_history: RingBuffer::new(config.gps_history),
            sender,
            subscribers: Mutex::new(HashMap::new()),
            next_subscriber: AtomicU64::new(1),
            clock: EventClock::new(),
            ingested: AtomicU64::new(0),
            suspect: AtomicU64::new(0),
            lag_dropped: AtomicU64::new(0),
            started: Instant::now(),
        })
    }

    /// Parse and ingest a JSON document
    pub fn ingest_json(&self, body: &[u8]) -> Result<Arc<Delivery>, HubError> {
        Ok(self.ingest(RawEvent::from_slice(body)?))
    }

    /// Validate, retain and broadcast one event.
    ///
    /// Never rejects: a failed check only annotates the event with a
    /// `suspect` list of reasons.
    pub fn ingest(&self, mut event: RawEvent) -> Arc<Delivery> {
        let tag = event.kind_tag();
        let class = HistoryClass::for_tag(&tag);
        normalize_kind(&mut event, &tag);

        let mut state = self.lock_ingest();
        let mut validation = self.validator.check(&event);

        if let Some(current) = event.timestamp() {
            match state.last_timestamp.get(&class) {
                Some(previous) if current < *previous => {
                    validation.push(ValidationError::TimestampRegressed {
                        previous: previous.to_rfc3339(),
                        current: current.to_rfc3339(),
                    });
                }
                _ => {
                    state.last_timestamp.insert(class, current);
                }
            }
        }

        if let Validation::Suspect(errors) = &validation {
            warn!("Suspect {} event: {:?}", class.as_str(), errors);
            let reasons = validation.reasons().into_iter().map(Value::String).collect();
            event.insert("suspect", Value::Array(reasons));
            self.suspect.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("hub_events_suspect_total").increment(1);
        }

        state.next_seq += 1;
        let json = event.to_json();
        let delivery = Arc::new(Delivery {
            seq: state.next_seq,
            class,
            event,
            json,
            validation,
        });

        self.history(class).push(Arc::clone(&delivery));
        // Err only means nobody is listening
        let receivers = self.sender.send(Arc::clone(&delivery)).unwrap_or(0);
        drop(state);

        self.ingested.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("hub_events_ingested_total", "kind" => class.as_str()).increment(1);
        debug!("Ingested #{} to {} subscribers", delivery.seq, receivers);
        delivery
    }

    /// Register a subscriber; its first message is a `connected` marker.
    ///
    /// History is not replayed: only events ingested after this call are
    /// delivered.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let receiver = self.sender.subscribe();
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(SubscriberState::new(id));

        let count = {
            let mut subscribers = self.lock_subscribers();
            subscribers.insert(id, Arc::clone(&state));
            subscribers.len()
        };
        metrics::gauge!("hub_subscribers").set(count as f64);
        info!("Subscriber {} connected ({} live)", id, count);

        let marker = TelemetryEvent::Connected(ConnectedMarker::new(self.clock.now()));
        let marker = marker
            .to_json()
            .unwrap_or_else(|_| format!(r#"{{"kind":"{}"}}"#, EventKind::Connected));

        Subscription::new(Arc::clone(self), state, receiver, Message::Connected(marker))
    }

    /// Release a subscriber. Safe to call more than once.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let (removed, count) = {
            let mut subscribers = self.lock_subscribers();
            (subscribers.remove(&id), subscribers.len())
        };
        let Some(state) = removed else {
            return false;
        };
        state.mark_dead();
        metrics::gauge!("hub_subscribers").set(count as f64);
        info!(
            "Subscriber {} gone after {} messages, {} dropped ({} live)",
            id,
            state.delivered(),
            state.dropped(),
            count
        );
        true
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    pub fn subscribers(&self) -> Vec<SubscriberInfo> {
        let mut list: Vec<_> = self.lock_subscribers().values().map(|s| s.info()).collect();
        list.sort_by_key(|info| info.id);
        list
    }

    /// Retained events of a class, oldest first
    pub fn snapshot(&self, class: HistoryClass) -> Vec<Arc<Delivery>> {
        self.history(class).snapshot()
    }

    /// The `limit` most recent events of a class, newest first
    pub fn recent(&self, class: HistoryClass, limit: usize) -> Vec<Arc<Delivery>> {
        self.history(class).read_last(limit)
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            ingested: self.ingested.load(Ordering::Relaxed),
            suspect: self.suspect.load(Ordering::Relaxed),
            subscribers: self.subscriber_count(),
            lag_dropped: self.lag_dropped.load(Ordering::Relaxed),
            uptime_seconds: self.started.elapsed().as_secs(),
            obd_history: self.obd_history.stats(),
            gps_history: self.gps_history.stats(),
        }
    }

    fn history(&self, class: HistoryClass) -> &RingBuffer<Arc<Delivery>> {
        match class {
            HistoryClass::Obd => &self.obd_history,
            HistoryClass::Gps => &self.gps_history,
        }
    }

    fn lock_ingest(&self) -> MutexGuard<'_, IngestState> {
        self.ingest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, HashMap<u64, Arc<SubscriberState>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Give every forwarded event a `kind` field, spelled the canonical way
/// when the kind is known. Unknown kinds pass through untouched.
fn normalize_kind(event: &mut RawEvent, tag: &KindTag) {
    let kind = match tag {
        KindTag::Missing => EventKind::Obd,
        KindTag::Known(kind) => *kind,
        KindTag::Unknown(_) => return,
    };
    if event.get("kind").and_then(Value::as_str) != Some(kind.as_str()) {
        event.insert("kind", Value::from(kind.as_str()));
    }
}
