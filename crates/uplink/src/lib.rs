//! Car-to-Ground Uplink
//!
//! Moves telemetry produced on the car node to the ground station:
//! - [`LocalQueue`]: bounded per-kind FIFO, drop-oldest on overflow
//! - [`Ingress`]: shared handle producers push into
//! - [`Backoff`]: capped exponential reconnect delay
//! - [`Uplink`]: `Disconnected -> Connecting -> Connected` state machine
//! - [`HttpLink`]: the HTTP transport to the ground hub

mod backoff;
mod error;
mod ingress;
mod link;
mod queue;
mod transport;

pub use backoff::Backoff;
pub use error::UplinkError;
pub use ingress::Ingress;
pub use link::{HttpLink, Link, LinkState};
pub use queue::{LocalQueue, Queued};
pub use transport::{Uplink, UplinkConfig, UplinkStats};
