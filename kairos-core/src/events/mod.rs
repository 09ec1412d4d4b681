//! ## kairos-core::events
//! **Event records and the queues that order them**
//!
//! ### Expectations:
//! - Events and continuations are pooled and cleared on release
//! - Ordering is `(time, seq)`; `seq` is assigned when the event is scheduled
//! - The scheduler owns queued events until they are removed

pub mod event;
pub mod scheduler;

pub use event::{Continuation, Event};
pub(crate) use event::{Invocation, Invoke, Payload};
pub use scheduler::{Calendar, Heap, Scheduled, Scheduler, SchedulerError};
