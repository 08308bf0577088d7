//! Telemetry Validation
//!
//! Lenient checks for events arriving at the hub. Nothing here rejects an
//! event: the outcome is a [`Validation`] tag the hub attaches before
//! forwarding.

mod error;
mod validator;

pub use error::ValidationError;
pub use validator::{Validation, ValidationConfig, Validator, OBD_FIELDS};
