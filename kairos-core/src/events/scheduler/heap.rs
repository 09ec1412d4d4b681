use super::{Scheduled, Scheduler, SchedulerError};

/// Initial logical capacity; the heap never shrinks below it.
pub const INIT_LENGTH: usize = 10;

/// Array-backed binary min-heap keyed by `(time, seq)`.
///
/// Capacity doubles when the heap is full and halves once occupancy drops
/// below a quarter, so a burst followed by a quiet period gives memory back.
#[derive(Debug)]
pub struct Heap<T> {
    items: Vec<T>,
    capacity: usize,
    halve_below: usize,
}

impl<T: Scheduled> Default for Heap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scheduled> Heap<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::with_capacity(INIT_LENGTH),
            capacity: INIT_LENGTH,
            halve_below: 0,
        }
    }

    /// Logical capacity, as tracked by the grow/shrink policy.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.grow();
        }
        self.items.push(item);
        self.sift_up(self.items.len() - 1);
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let first = self.items.swap_remove(0);
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        if self.items.len() < self.halve_below {
            self.shrink();
        }
        Some(first)
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.items[i].key() >= self.items[parent].key() {
                break;
            }
            self.items.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * i + 1;
            let right = left + 1;
            let mut smallest = i;
            if left < len && self.items[left].key() < self.items[smallest].key() {
                smallest = left;
            }
            if right < len && self.items[right].key() < self.items[smallest].key() {
                smallest = right;
            }
            if smallest == i {
                return;
            }
            self.items.swap(i, smallest);
            i = smallest;
        }
    }

    fn grow(&mut self) {
        self.capacity *= 2;
        self.items.reserve_exact(self.capacity - self.items.len());
        self.halve_below = self.capacity / 4;
    }

    fn shrink(&mut self) {
        let halved = self.capacity / 2;
        if halved < INIT_LENGTH {
            self.halve_below = 0;
            return;
        }
        self.capacity = halved;
        self.items.shrink_to(halved);
        self.halve_below = if halved > INIT_LENGTH { halved / 4 } else { 0 };
    }
}

impl<T: Scheduled> Scheduler<T> for Heap<T> {
    #[inline]
    fn insert(&mut self, item: T) {
        self.push(item);
    }

    #[inline]
    fn remove_first(&mut self) -> Result<T, SchedulerError> {
        self.pop().ok_or(SchedulerError::Empty)
    }

    #[inline]
    fn peek_first(&mut self) -> Option<&T> {
        self.peek()
    }

    #[inline]
    fn len(&self) -> usize {
        self.items.len()
    }

    fn clear(&mut self) {
        self.items.clear();
        self.items.shrink_to(INIT_LENGTH);
        self.capacity = INIT_LENGTH;
        self.halve_below = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::scheduler::testing::{drain, Item};

    #[test]
    fn equal_times_follow_insertion_order() {
        let mut heap = Heap::new();
        for seq in 0..20 {
            heap.insert(Item { time: 7, seq });
        }
        let seqs: Vec<u64> = drain(&mut heap).into_iter().map(|i| i.seq).collect();
        assert_eq!(seqs, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn capacity_doubles_then_halves() {
        let mut heap = Heap::new();
        for seq in 0..41 {
            heap.insert(Item { time: 40 - seq, seq });
        }
        assert_eq!(heap.capacity(), 80);

        // 80 -> 40 once fewer than 20 remain, 40 -> 20 below 10
        while heap.len() >= 20 {
            heap.remove_first().unwrap();
        }
        assert_eq!(heap.capacity(), 40);
        while heap.len() >= 10 {
            heap.remove_first().unwrap();
        }
        assert_eq!(heap.capacity(), 20);
        while heap.remove_first().is_ok() {}
        assert!(heap.capacity() >= INIT_LENGTH);
    }

    #[test]
    fn empty_heap_reports_error() {
        let mut heap: Heap<Item> = Heap::new();
        assert!(heap.peek_first().is_none());
        assert_eq!(heap.remove_first(), Err(SchedulerError::Empty));
    }
}
