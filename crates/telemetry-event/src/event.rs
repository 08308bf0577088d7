//! Typed Telemetry Events

use crate::{EventError, EventKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A partial or complete set of engine parameters.
///
/// Any subset of the fields may be absent: a parameter the adapter did not
/// answer for is simply left out of the serialized event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObdReading {
    /// Producer-side timestamp
    pub timestamp: DateTime<Utc>,
    /// Vehicle speed (km/h)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Engine RPM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpm: Option<f64>,
    /// Coolant temperature (°C)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coolant_temp: Option<f64>,
    /// Throttle position (%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle: Option<f64>,
    /// Calculated engine load (%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_load: Option<f64>,
    /// Fuel tank level (%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_level: Option<f64>,
    /// Fields this version does not know about
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObdReading {
    /// Create an empty reading stamped with `timestamp`
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            speed: None,
            rpm: None,
            coolant_temp: None,
            throttle: None,
            engine_load: None,
            fuel_level: None,
            extra: Map::new(),
        }
    }

    /// Number of engine parameters present
    pub fn field_count(&self) -> usize {
        [
            self.speed,
            self.rpm,
            self.coolant_temp,
            self.throttle,
            self.engine_load,
            self.fuel_level,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
    }

    /// True when no engine parameter was read
    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }
}

/// A GPS position fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    /// Producer-side timestamp
    pub timestamp: DateTime<Utc>,
    /// Latitude in decimal degrees, [-90, 90]
    pub latitude: f64,
    /// Longitude in decimal degrees, [-180, 180]
    pub longitude: f64,
    /// Altitude above mean sea level (m)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Ground speed (m/s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Course over ground, degrees from true north, [0, 360]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Fields this version does not know about
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GpsFix {
    /// Create a fix with only the required fields
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            altitude: None,
            speed: None,
            heading: None,
            extra: Map::new(),
        }
    }

    /// Whether latitude and longitude are finite and inside their ranges
    pub fn has_valid_position(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Stream-established marker, one per subscriber connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedMarker {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConnectedMarker {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            extra: Map::new(),
        }
    }
}

/// The unit of transport, discriminated by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TelemetryEvent {
    Obd(ObdReading),
    Gps(GpsFix),
    Connected(ConnectedMarker),
}

impl TelemetryEvent {
    /// The event discriminator
    pub fn kind(&self) -> EventKind {
        match self {
            TelemetryEvent::Obd(_) => EventKind::Obd,
            TelemetryEvent::Gps(_) => EventKind::Gps,
            TelemetryEvent::Connected(_) => EventKind::Connected,
        }
    }

    /// Producer-side timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TelemetryEvent::Obd(e) => e.timestamp,
            TelemetryEvent::Gps(e) => e.timestamp,
            TelemetryEvent::Connected(e) => e.timestamp,
        }
    }

    /// Encode as a single-line JSON document
    pub fn to_json(&self) -> Result<String, EventError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<ObdReading> for TelemetryEvent {
    fn from(reading: ObdReading) -> Self {
        TelemetryEvent::Obd(reading)
    }
}

impl From<GpsFix> for TelemetryEvent {
    fn from(fix: GpsFix) -> Self {
        TelemetryEvent::Gps(fix)
    }
}
