//! Telemetry Acquisition
//!
//! Polls the OBD-II adapter and the GPS receiver on independent cadences and
//! pushes the resulting events into the uplink ingress.

mod config;
mod gps;
mod obd;
mod runner;

pub use config::AcquisitionConfig;
pub use gps::GpsPoller;
pub use obd::ObdPoller;
pub use runner::run;
