//! Telemetry Event Model
//!
//! The unit of transport between the car node, the ground hub and the
//! dashboards. Producers build strongly typed [`TelemetryEvent`]s; the hub
//! works on the lenient [`RawEvent`] envelope so that malformed or newer
//! payloads are still forwarded with every field intact.

mod clock;
mod event;
mod raw;

pub use clock::EventClock;
pub use event::{ConnectedMarker, GpsFix, ObdReading, TelemetryEvent};
pub use raw::{KindTag, RawEvent};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Discriminator carried in the `kind` field of every event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Engine parameters read from the OBD-II bus
    Obd,
    /// Position fix from the GPS receiver
    Gps,
    /// Per-subscriber stream liveness marker
    Connected,
}

impl EventKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Obd => "obd",
            EventKind::Gps => "gps",
            EventKind::Connected => "connected",
        }
    }

    /// Parse a wire name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "obd" => Some(EventKind::Obd),
            "gps" => Some(EventKind::Gps),
            "connected" => Some(EventKind::Connected),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while converting between event representations
#[derive(Debug, Error)]
pub enum EventError {
    /// The payload is valid JSON but not an object
    #[error("Event payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
