//! Bounded Drop-Oldest Buffers
//!
//! Two flavours of the same overflow policy: when full, the oldest entry is
//! evicted to make room for the newest.
//!
//! - [`RingBuffer`] is shared (`&self` API) with one writer and many readers;
//!   readers always get a consistent snapshot.
//! - [`BoundedQueue`] is an owned FIFO for a single task.

mod buffer;
mod queue;

pub use buffer::{BufferStats, RingBuffer};
pub use queue::BoundedQueue;
