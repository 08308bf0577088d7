//! Owned Bounded FIFO

use std::collections::VecDeque;

/// FIFO that drops its oldest entry instead of rejecting a new one
#[derive(Debug, Clone)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: u64,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append at the back, evicting and returning the oldest entry when full
    pub fn push_back(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.dropped += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Put an entry back at the head.
    ///
    /// The head is the oldest slot, so on a full queue the entry itself is
    /// the one discarded and handed back.
    pub fn push_front(&mut self, item: T) -> Option<T> {
        if self.items.len() >= self.capacity {
            self.dropped += 1;
            return Some(item);
        }
        self.items.push_front(item);
        None
    }

    /// Remove the oldest entry
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Peek at the oldest entry
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entries discarded on overflow since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn drain<T>(queue: &mut BoundedQueue<T>) -> Vec<T> {
        std::iter::from_fn(|| queue.pop_front()).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = BoundedQueue::new(4);
        queue.push_back('a');
        queue.push_back('b');
        assert_eq!(queue.pop_front(), Some('a'));
        assert_eq!(queue.pop_front(), Some('b'));
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut queue = BoundedQueue::new(3);
        for i in 0..5 {
            queue.push_back(i);
        }
        assert_eq!(queue.dropped(), 2);
        assert_eq!(drain(&mut queue), vec![2, 3, 4]);
    }

    #[test]
    fn test_push_front_on_full_queue_returns_item() {
        let mut queue = BoundedQueue::new(2);
        queue.push_back(1);
        queue.push_back(2);
        assert_eq!(queue.push_front(0), Some(0));
        assert_eq!(queue.dropped(), 1);

        queue.pop_front();
        assert_eq!(queue.push_front(1), None);
        assert_eq!(queue.front(), Some(&1));
    }

    proptest! {
        #[test]
        fn prop_bounded_and_keeps_newest(capacity in 1usize..32, items in prop::collection::vec(any::<u32>(), 0..200)) {
            let mut queue = BoundedQueue::new(capacity);
            for item in &items {
                queue.push_back(*item);
                prop_assert!(queue.len() <= capacity);
            }
            let keep = items.len().min(capacity);
            let kept = drain(&mut queue);
            prop_assert_eq!(kept, items[items.len() - keep..].to_vec());
        }
    }
}
