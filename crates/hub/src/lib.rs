//! Ingest & Fan-out Hub
//!
//! The single authoritative ingestion point on the ground node. Every event
//! is validated leniently, stamped with a sequence number, appended to the
//! history buffer of its class and broadcast to every live subscriber.
//!
//! Fan-out uses one [`tokio::sync::broadcast`] channel: each subscriber reads
//! at its own pace and a subscriber that falls more than the channel capacity
//! behind loses its oldest undelivered messages, never blocking ingestion or
//! other subscribers.

mod delivery;
mod error;
mod hub;
mod subscriber;

pub use delivery::{Delivery, HistoryClass, Message};
pub use error::HubError;
pub use hub::{Hub, HubConfig, HubStats};
pub use subscriber::{SubscriberInfo, Subscription};
