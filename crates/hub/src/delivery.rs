//! Delivered Messages

use crate::error::HubError;
use data_validator::Validation;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use telemetry_event::{EventKind, KindTag, RawEvent};

/// History buffer an event is retained in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryClass {
    /// Engine data and anything not recognisably GPS
    Obd,
    /// Position fixes, kept deeper for trail rendering
    Gps,
}

impl HistoryClass {
    pub fn for_tag(tag: &KindTag) -> Self {
        match tag {
            KindTag::Known(EventKind::Gps) => HistoryClass::Gps,
            _ => HistoryClass::Obd,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryClass::Obd => "obd",
            HistoryClass::Gps => "gps",
        }
    }
}

impl FromStr for HistoryClass {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "obd" => Ok(HistoryClass::Obd),
            "gps" => Ok(HistoryClass::Gps),
            other => Err(HubError::UnknownHistory(other.to_string())),
        }
    }
}

/// One ingested event as handed to subscribers
#[derive(Debug)]
pub struct Delivery {
    /// Ingest order, starting at 1
    pub seq: u64,
    pub class: HistoryClass,
    /// The event, annotated when suspect
    pub event: RawEvent,
    /// Pre-encoded wire form, shared by every subscriber
    pub json: String,
    pub validation: Validation,
}

/// What a subscriber receives
#[derive(Debug, Clone)]
pub enum Message {
    /// The stream-established marker, always first
    Connected(String),
    Event(Arc<Delivery>),
}

impl Message {
    /// Wire form of the message
    pub fn json(&self) -> &str {
        match self {
            Message::Connected(json) => json,
            Message::Event(delivery) => &delivery.json,
        }
    }

    /// Ingest sequence number; `None` for the marker
    pub fn seq(&self) -> Option<u64> {
        match self {
            Message::Connected(_) => None,
            Message::Event(delivery) => Some(delivery.seq),
        }
    }
}
