//! ## kairos-core::alloc::pool
//! **Fixed-capacity free lists**
//!
//! `get` pops a recycled object or allocates a fresh one when the list is
//! empty. `put` clears the object and keeps it only while the list has room;
//! past capacity the box is simply dropped.

use super::stats::PoolStats;

/// Objects that can be cleared for reuse. Every reference the object holds
/// must be released so that a pooled object retains nothing.
pub trait Recycle {
    fn recycle(&mut self);
}

pub struct Pool<T> {
    free: Vec<Box<T>>,
    capacity: usize,
    stats: PoolStats,
}

impl<T: Recycle + Default> Pool<T> {
    /// Creates a pool pre-filled with `capacity` objects.
    pub fn new(capacity: usize) -> Self {
        let free = (0..capacity).map(|_| Box::<T>::default()).collect();
        Self {
            free,
            capacity,
            stats: PoolStats::default(),
        }
    }

    /// Returns a cleared object, allocating only when the pool is empty.
    #[inline]
    pub fn get(&mut self) -> Box<T> {
        match self.free.pop() {
            Some(item) => {
                self.stats.reuses += 1;
                item
            }
            None => {
                self.stats.fresh_allocations += 1;
                Box::default()
            }
        }
    }

    /// Clears `item` and keeps it if there is room.
    #[inline]
    pub fn put(&mut self, mut item: Box<T>) {
        item.recycle();
        if self.free.len() < self.capacity {
            self.free.push(item);
            self.stats.releases += 1;
        } else {
            self.stats.discards += 1;
        }
    }

    /// Objects currently waiting in the free list.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}
