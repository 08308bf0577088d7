//! Validation Error Types

use thiserror::Error;

/// Reasons an event is considered suspect
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Value out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Field present with the wrong JSON type
    #[error("{field} should be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Discriminator this version does not know
    #[error("Unknown event kind: {0}")]
    UnknownKind(String),

    /// Kind that producers are not expected to send
    #[error("Unexpected {0} event from producer")]
    UnexpectedKind(&'static str),

    /// Producer timestamp earlier than the previous event of the same kind
    #[error("timestamp {current} precedes previous {previous}")]
    TimestampRegressed { previous: String, current: String },
}
