//! Uplink Error Types

use telemetry_event::EventError;
use thiserror::Error;

/// Transport faults. None is fatal to the uplink; see [`UplinkError::is_permanent`]
/// for the ones that are not worth retrying.
#[derive(Debug, Error)]
pub enum UplinkError {
    /// Request could not be completed (connect, timeout, reset)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ground station answered with a non-success status
    #[error("Ground station returned status {0}")]
    Status(u16),

    /// Event could not be encoded
    #[error("Encoding error: {0}")]
    Encode(#[from] EventError),

    /// Link used before it was connected
    #[error("Link not connected")]
    NotConnected,

    /// Invalid ground station URL
    #[error("Invalid ground URL: {0}")]
    InvalidUrl(String),
}

impl UplinkError {
    /// Whether resending the same event can never succeed: the ground
    /// station rejected it as a client error, or it cannot be encoded.
    /// 408 and 429 are transient.
    pub fn is_permanent(&self) -> bool {
        match self {
            UplinkError::Status(status) => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            UplinkError::Encode(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_classification() {
        assert!(UplinkError::Status(400).is_permanent());
        assert!(UplinkError::Status(422).is_permanent());
        assert!(!UplinkError::Status(408).is_permanent());
        assert!(!UplinkError::Status(429).is_permanent());
        assert!(!UplinkError::Status(503).is_permanent());
        assert!(!UplinkError::NotConnected.is_permanent());
    }
}
