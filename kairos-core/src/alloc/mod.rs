//! ## kairos-core::alloc
//! **Free-list pools for the dispatch hot path**
//!
//! ### Key Submodules:
//! - `pool/`: fixed-capacity free lists for events and continuation records
//! - `stats/`: allocation counters reported with each run summary
//!
//! Pools are intentionally not thread-safe: one controller drives one thread.

pub mod pool;
pub mod stats;

pub use pool::{Pool, Recycle};
pub use stats::PoolStats;
