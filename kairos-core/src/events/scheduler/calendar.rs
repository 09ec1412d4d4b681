use super::{Heap, Scheduled, Scheduler, SchedulerError};
use crate::time::Time;

/// Calendar queue: a ring of `bins` buckets, each `bin_width` ticks wide.
///
/// An item lands in bucket `(time / bin_width) % bins`. Removal scans forward
/// from the bucket holding the current window and takes the first bucket
/// whose head falls inside that bucket's window. A full revolution without a
/// hit falls back to a direct minimum search over every bucket head.
#[derive(Debug)]
pub struct Calendar<T> {
    bins: Vec<Heap<T>>,
    bin_width: Time,
    len: usize,
    last_bin: usize,
    /// Exclusive upper bound of the window currently covered by `last_bin`.
    bin_max: Time,
}

impl<T: Scheduled> Calendar<T> {
    /// Zero width or zero bins are raised to one.
    pub fn new(bin_width: Time, bins: usize) -> Self {
        let bin_width = bin_width.max(1);
        let bins = bins.max(1);
        Self {
            bins: (0..bins).map(|_| Heap::new()).collect(),
            bin_width,
            len: 0,
            last_bin: 0,
            bin_max: bin_width,
        }
    }

    pub fn bin_width(&self) -> Time {
        self.bin_width
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    #[inline]
    fn bin_of(&self, time: Time) -> usize {
        ((time / self.bin_width) % self.bins.len() as u64) as usize
    }

    #[inline]
    fn window_start(&self) -> Time {
        self.bin_max.saturating_sub(self.bin_width)
    }

    /// Move the scan window to the bucket that holds `time`.
    fn rewind(&mut self, time: Time) {
        self.last_bin = self.bin_of(time);
        self.bin_max = (time - time % self.bin_width).saturating_add(self.bin_width);
    }

    /// Locate the bucket holding the earliest item.
    fn next_bin(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let count = self.bins.len();
        let mut i = self.last_bin;
        for _ in 0..count {
            if let Some(head) = self.bins[i].peek() {
                if head.time() < self.bin_max {
                    self.last_bin = i;
                    return Some(i);
                }
            }
            i = (i + 1) % count;
            self.bin_max = self.bin_max.saturating_add(self.bin_width);
        }

        // sparse queue: jump straight to the global minimum
        let (time, bin) = self
            .bins
            .iter()
            .enumerate()
            .filter_map(|(i, bin)| bin.peek().map(|head| (head.key(), i)))
            .min()
            .map(|((time, _), i)| (time, i))?;
        self.rewind(time);
        Some(bin)
    }
}

impl<T: Scheduled> Scheduler<T> for Calendar<T> {
    fn insert(&mut self, item: T) {
        let time = item.time();
        if self.len == 0 || time < self.window_start() {
            self.rewind(time);
        }
        let bin = self.bin_of(time);
        self.bins[bin].push(item);
        self.len += 1;
    }

    fn remove_first(&mut self) -> Result<T, SchedulerError> {
        let bin = self.next_bin().ok_or(SchedulerError::Empty)?;
        let item = self.bins[bin].pop().ok_or(SchedulerError::Empty)?;
        self.len -= 1;
        Ok(item)
    }

    fn peek_first(&mut self) -> Option<&T> {
        let bin = self.next_bin()?;
        self.bins[bin].peek()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        for bin in &mut self.bins {
            Scheduler::clear(bin);
        }
        self.len = 0;
        self.last_bin = 0;
        self.bin_max = self.bin_width;
    }
}
