//! Hub Error Types

use telemetry_event::EventError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    /// Payload is not a JSON object
    #[error("Malformed event: {0}")]
    Malformed(#[from] EventError),

    /// History class name not recognised
    #[error("Unknown history class: {0}")]
    UnknownHistory(String),
}
