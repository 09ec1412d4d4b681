//! # kairos-core
//!
//! Deterministic discrete-event simulation kernel. Application code is
//! written as ordinary entities with typed operations; the controller runs
//! those operations in simulation-time order and turns blocking calls into
//! pairs of scheduled events.
//!
//! ### Expectations:
//! - Events run in non-decreasing time order, ties in scheduling order
//! - Blocking operations are native futures polled by the controller
//! - No allocation in the steady-state dispatch path beyond what operations do
//!
//! ### Key Submodules:
//! - `events`: event records, heap and calendar-queue schedulers
//! - `controller`: the dispatch loop and call/return protocol
//! - `alloc`: free-list pools for events and continuations
//! - `channel` / `proxy`: primitives built on the call/return protocol

pub mod alloc;
pub mod channel;
pub mod controller;
pub mod entity;
pub mod error;
pub mod events;
pub mod log;
pub mod proxy;
pub mod remote;
pub mod sleep;
pub mod time;

pub mod prelude {
    pub use crate::channel::{Channel, ChannelError, SendOptions};
    pub use crate::controller::{Call, Deferred, RunState, RunSummary, Sim};
    pub use crate::entity::{Context, Entity, EntityRef, Failure, Handler, Operation, Ref, Reply};
    pub use crate::error::{SimulationError, UsageError};
    pub use crate::proxy::{wrap, InterfaceDecl, Proxied, Proxy, Signature};
    pub use crate::time::{Time, END};
}

pub use controller::Sim;
pub use error::{SimulationError, UsageError};
