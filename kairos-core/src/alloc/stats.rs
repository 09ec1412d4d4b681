//! ## kairos-core::alloc::stats
//! **Pool allocation counters**

use std::fmt;

/// Counters kept by every [`Pool`](super::Pool).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects created because the free list was empty.
    pub fresh_allocations: u64,
    /// Objects served from the free list.
    pub reuses: u64,
    /// Objects accepted back into the free list.
    pub releases: u64,
    /// Objects dropped because the free list was full.
    pub discards: u64,
}

impl PoolStats {
    /// Share of `get` calls served without allocating.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.fresh_allocations + self.reuses;
        if total == 0 {
            return 1.0;
        }
        self.reuses as f64 / total as f64
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "new={} reused={} released={} discarded={} hit={:.1}%",
            self.fresh_allocations,
            self.reuses,
            self.releases,
            self.discards,
            self.hit_ratio() * 100.0
        )
    }
}
