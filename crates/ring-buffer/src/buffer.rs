//! Shared History Ring Buffer

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Point-in-time counters for a buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BufferStats {
    pub len: usize,
    pub capacity: usize,
    pub total_written: u64,
    pub evicted: u64,
}

/// Bounded history of the most recent entries.
///
/// Meant for one writer (the ingest path) and any number of readers. Every
/// read takes the lock once, so readers never observe a half-applied push.
pub struct RingBuffer<T> {
    /// Entries, oldest at the front
    storage: RwLock<VecDeque<T>>,
    /// Maximum number of retained entries
    capacity: usize,
    /// Total entries ever pushed
    total_written: AtomicU64,
    /// Entries evicted to make room
    evicted: AtomicU64,
}

impl<T: Clone> RingBuffer<T> {
    /// Create a new ring buffer holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            storage: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            total_written: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Append an entry, returning the evicted oldest entry when full
    pub fn push(&self, item: T) -> Option<T> {
        let mut storage = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        let evicted = if storage.len() >= self.capacity {
            storage.pop_front()
        } else {
            None
        };
        storage.push_back(item);
        drop(storage);

        self.total_written.fetch_add(1, Ordering::Relaxed);
        if evicted.is_some() {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        evicted
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.storage.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        storage.iter().cloned().collect()
    }

    /// Read the last N entries (most recent first)
    pub fn read_last(&self, count: usize) -> Vec<T> {
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        storage.iter().rev().take(count).cloned().collect()
    }

    /// Get total entries written (for statistics)
    pub fn total_written(&self) -> u64 {
        self.total_written.load(Ordering::Relaxed)
    }

    /// Get total entries evicted on overflow
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Counters in one struct
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            len: self.len(),
            capacity: self.capacity,
            total_written: self.total_written(),
            evicted: self.evicted(),
        }
    }
}
