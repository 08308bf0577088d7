//! Lenient Event Validator

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use telemetry_event::{EventKind, KindTag, RawEvent};
use tracing::debug;

/// Engine parameter fields an OBD event may carry
pub const OBD_FIELDS: [&str; 6] = [
    "speed",
    "rpm",
    "coolant_temp",
    "throttle",
    "engine_load",
    "fuel_level",
];

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Latitude valid range (degrees)
    pub latitude_range: (f64, f64),
    /// Longitude valid range (degrees)
    pub longitude_range: (f64, f64),
    /// Heading valid range (degrees)
    pub heading_range: (f64, f64),
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            latitude_range: (-90.0, 90.0),
            longitude_range: (-180.0, 180.0),
            heading_range: (0.0, 360.0),
        }
    }
}

/// Outcome of validating one event
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// Every check passed
    Accepted,
    /// Forwarded anyway, with the reasons it looks wrong
    Suspect(Vec<ValidationError>),
}

impl Validation {
    /// Build from collected errors
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        if errors.is_empty() {
            Validation::Accepted
        } else {
            Validation::Suspect(errors)
        }
    }

    pub fn is_suspect(&self) -> bool {
        matches!(self, Validation::Suspect(_))
    }

    /// Human-readable reasons, empty when accepted
    pub fn reasons(&self) -> Vec<String> {
        match self {
            Validation::Accepted => Vec::new(),
            Validation::Suspect(errors) => errors.iter().map(ToString::to_string).collect(),
        }
    }

    /// Short label used on the wire
    pub fn label(&self) -> &'static str {
        match self {
            Validation::Accepted => "accepted",
            Validation::Suspect(_) => "suspect",
        }
    }

    /// Append one more reason
    pub fn push(&mut self, error: ValidationError) {
        match self {
            Validation::Accepted => *self = Validation::Suspect(vec![error]),
            Validation::Suspect(errors) => errors.push(error),
        }
    }
}

/// Schema checks for inbound telemetry
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a single value against a range
    pub fn validate_range(
        &self,
        field: &'static str,
        value: f64,
        range: (f64, f64),
    ) -> Result<(), ValidationError> {
        if !value.is_finite() || value < range.0 || value > range.1 {
            Err(ValidationError::OutOfRange {
                field,
                value,
                min: range.0,
                max: range.1,
            })
        } else {
            Ok(())
        }
    }

    /// Validate latitude
    pub fn validate_latitude(&self, latitude: f64) -> Result<(), ValidationError> {
        self.validate_range("latitude", latitude, self.config.latitude_range)
    }

    /// Validate longitude
    pub fn validate_longitude(&self, longitude: f64) -> Result<(), ValidationError> {
        self.validate_range("longitude", longitude, self.config.longitude_range)
    }

    /// Validate heading
    pub fn validate_heading(&self, heading: f64) -> Result<(), ValidationError> {
        self.validate_range("heading", heading, self.config.heading_range)
    }

    /// Run every check that applies to the event's kind
    pub fn check(&self, event: &RawEvent) -> Validation {
        let mut errors = Vec::new();

        match event.kind_tag() {
            KindTag::Known(EventKind::Gps) => self.check_gps(event, &mut errors),
            KindTag::Known(EventKind::Obd) | KindTag::Missing => self.check_obd(event, &mut errors),
            KindTag::Known(EventKind::Connected) => {
                errors.push(ValidationError::UnexpectedKind(EventKind::Connected.as_str()))
            }
            KindTag::Unknown(name) => errors.push(ValidationError::UnknownKind(name)),
        }

        let validation = Validation::from_errors(errors);
        if let Validation::Suspect(errors) = &validation {
            debug!("Suspect event: {:?}", errors);
        }
        validation
    }

    /// GPS: position required and in range, optional heading in range
    fn check_gps(&self, event: &RawEvent, errors: &mut Vec<ValidationError>) {
        self.check_timestamp(event, true, errors);

        let latitude = required_number(event, "latitude", errors);
        let longitude = required_number(event, "longitude", errors);

        if let Some(lat) = latitude {
            errors.extend(self.validate_latitude(lat).err());
        }
        if let Some(lon) = longitude {
            errors.extend(self.validate_longitude(lon).err());
        }
        if let Some(heading) = optional_number(event, "heading", errors) {
            errors.extend(self.validate_heading(heading).err());
        }
        optional_number(event, "altitude", errors);
        optional_number(event, "speed", errors);
    }

    /// OBD: every known parameter, when present, must be a number or null
    fn check_obd(&self, event: &RawEvent, errors: &mut Vec<ValidationError>) {
        self.check_timestamp(event, false, errors);
        for field in OBD_FIELDS {
            optional_number(event, field, errors);
        }
    }

    fn check_timestamp(&self, event: &RawEvent, required: bool, errors: &mut Vec<ValidationError>) {
        match event.get("timestamp") {
            None | Some(Value::Null) if required => {
                errors.push(ValidationError::MissingField("timestamp"))
            }
            None | Some(Value::Null) => {}
            Some(_) if event.timestamp().is_none() => errors.push(ValidationError::WrongType {
                field: "timestamp".to_string(),
                expected: "an RFC 3339 timestamp",
            }),
            Some(_) => {}
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

fn required_number(
    event: &RawEvent,
    field: &'static str,
    errors: &mut Vec<ValidationError>,
) -> Option<f64> {
    match event.get(field) {
        None | Some(Value::Null) => {
            errors.push(ValidationError::MissingField(field));
            None
        }
        Some(_) => optional_number(event, field, errors),
    }
}

fn optional_number(
    event: &RawEvent,
    field: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<f64> {
    match event.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(_) => {
            errors.push(ValidationError::WrongType {
                field: field.to_string(),
                expected: "a number",
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawEvent {
        RawEvent::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_gps() {
        let validator = Validator::default();
        let event = raw(json!({
            "kind": "gps",
            "timestamp": "2024-05-01T12:00:00Z",
            "latitude": 38.16,
            "longitude": -122.45,
            "heading": 359.9
        }));
        assert_eq!(validator.check(&event), Validation::Accepted);
    }

    #[test]
    fn test_latitude_out_of_range_is_suspect() {
        let validator = Validator::default();
        let event = raw(json!({
            "kind": "gps",
            "timestamp": "2024-05-01T12:00:00Z",
            "latitude": 200,
            "longitude": -122.45
        }));
        let validation = validator.check(&event);
        assert!(validation.is_suspect());
        assert_eq!(validation.reasons(), vec!["latitude value 200 is out of range [-90, 90]"]);
    }

    #[test]
    fn test_gps_missing_fields() {
        let validator = Validator::default();
        let event = raw(json!({"kind": "gps", "latitude": "north"}));
        let Validation::Suspect(errors) = validator.check(&event) else {
            panic!("expected suspect");
        };
        assert!(errors.contains(&ValidationError::MissingField("timestamp")));
        assert!(errors.contains(&ValidationError::MissingField("longitude")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::WrongType { field, .. } if field == "latitude")));
    }

    #[test]
    fn test_heading_range() {
        let validator = Validator::default();
        assert!(validator.validate_heading(0.0).is_ok());
        assert!(validator.validate_heading(360.0).is_ok());
        assert!(validator.validate_heading(361.0).is_err());
        assert!(validator.validate_heading(f64::NAN).is_err());
    }

    #[test]
    fn test_obd_shape_only() {
        let validator = Validator::default();
        let partial = raw(json!({"kind": "obd", "rpm": 12000, "speed": null}));
        assert_eq!(validator.check(&partial), Validation::Accepted);

        let wrong = raw(json!({"kind": "obd", "rpm": "fast"}));
        assert!(validator.check(&wrong).is_suspect());
    }

    #[test]
    fn test_bare_legacy_obd_accepted() {
        let validator = Validator::default();
        let legacy = raw(json!({"speed": 88.0, "rpm": 4100.0}));
        assert_eq!(validator.check(&legacy), Validation::Accepted);
    }

    #[test]
    fn test_unknown_and_connected_kinds_are_suspect() {
        let validator = Validator::default();
        assert!(validator.check(&raw(json!({"kind": "tyres"}))).is_suspect());
        assert!(validator.check(&raw(json!({"kind": "connected"}))).is_suspect());
    }

    #[test]
    fn test_validation_push() {
        let mut validation = Validation::Accepted;
        validation.push(ValidationError::MissingField("timestamp"));
        assert_eq!(validation.label(), "suspect");
        assert_eq!(validation.reasons().len(), 1);
    }
}
