//! Fixed-capacity FIFO ring

use std::collections::vec_deque::{self, VecDeque};

/// Bounded queue that evicts its oldest element on overflow.
///
/// Insertion order is preserved; nothing is ever reordered.
#[derive(Debug, Clone)]
pub struct Ring<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> Ring<T> {
    /// Create a ring holding at most `capacity` items (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, returning how many old items were evicted
    pub fn push(&mut self, item: T) -> usize {
        let mut evicted = 0;
        while self.items.len() >= self.capacity {
            self.items.pop_front();
            evicted += 1;
        }
        self.items.push_back(item);
        evicted
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.items.iter()
    }

    /// The newest `n` items, oldest first
    pub fn tail(&self, n: usize) -> vec_deque::Iter<'_, T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.range(skip..)
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index of the first item for which `pred` is false; items must be
    /// partitioned by `pred`
    pub fn partition_point<P>(&self, pred: P) -> usize
    where
        P: FnMut(&T) -> bool,
    {
        self.items.partition_point(pred)
    }

    pub fn range_from(&self, start: usize) -> vec_deque::Iter<'_, T> {
        self.items.range(start.min(self.items.len())..)
    }
}
