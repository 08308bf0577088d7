//! Lenient JSON Event Envelope

use crate::{EventError, EventKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of looking up an envelope's discriminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindTag {
    /// A kind this version understands
    Known(EventKind),
    /// Neither `kind` nor `type` is present
    Missing,
    /// A discriminator this version does not understand
    Unknown(String),
}

/// A telemetry event held as an untouched JSON object.
///
/// Used wherever events must be forwarded even when they do not match the
/// typed model: every key, known or not, is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEvent(Map<String, Value>);

impl RawEvent {
    /// Wrap a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(EventError::NotAnObject("null")),
            Value::Bool(_) => Err(EventError::NotAnObject("boolean")),
            Value::Number(_) => Err(EventError::NotAnObject("number")),
            Value::String(_) => Err(EventError::NotAnObject("string")),
            Value::Array(_) => Err(EventError::NotAnObject("array")),
        }
    }

    /// Parse a JSON document
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EventError> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    /// Discriminator, reading `kind` first and the legacy `type` second
    pub fn kind_tag(&self) -> KindTag {
        let tag = self.0.get("kind").or_else(|| self.0.get("type"));
        match tag {
            None => KindTag::Missing,
            Some(Value::String(name)) => match EventKind::parse(name) {
                Some(kind) => KindTag::Known(kind),
                None => KindTag::Unknown(name.clone()),
            },
            Some(other) => KindTag::Unknown(other.to_string()),
        }
    }

    /// Producer timestamp, if present and parseable as RFC 3339
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.0
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Look up a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a field, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Borrow the underlying object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Encode as a single-line JSON document
    pub fn to_json(&self) -> String {
        // A map of JSON values with string keys always serializes.
        serde_json::to_string(&self.0).unwrap_or_else(|_| String::from("{}"))
    }
}
