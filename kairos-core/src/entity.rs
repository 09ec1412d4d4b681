//! ## kairos-core::entity
//! **Identity model and typed operation dispatch**
//!
//! Entities are plain Rust values registered with a controller. Everything
//! outside the controller talks to them through an [`EntityRef`] (untyped,
//! serializable) or a [`Ref`] (the same handle carrying the entity type, so
//! that only operations the entity actually handles can be scheduled on it).
//!
//! Operation dispatch is static: an entity type implements [`Handler<M>`] for
//! every operation type `M` it accepts.

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::controller::{Deferred, Sim};
use crate::events::Continuation;
use crate::time::Time;

/// Failure raised by an entity operation. Crosses the call/return protocol
/// unchanged, so callers can `downcast_ref` to the concrete error.
pub type Failure = anyhow::Error;

/// Opaque handle: (controller identity, registry index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    controller: u32,
    index: u32,
}

impl EntityRef {
    pub const NULL: EntityRef = EntityRef {
        controller: u32::MAX,
        index: u32::MAX,
    };

    pub(crate) const fn new(controller: u32, index: u32) -> Self {
        Self { controller, index }
    }

    #[inline]
    pub fn controller(&self) -> u32 {
        self.controller
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "e{}:{}", self.controller, self.index)
        }
    }
}

/// Typed entity handle.
pub struct Ref<E: ?Sized> {
    raw: EntityRef,
    _entity: PhantomData<fn() -> E>,
}

impl<E: ?Sized> Ref<E> {
    pub(crate) fn from_raw(raw: EntityRef) -> Self {
        Self {
            raw,
            _entity: PhantomData,
        }
    }

    #[inline]
    pub fn raw(&self) -> EntityRef {
        self.raw
    }
}

impl<E: ?Sized> Clone for Ref<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: ?Sized> Copy for Ref<E> {}

impl<E: ?Sized> PartialEq for Ref<E> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<E: ?Sized> Eq for Ref<E> {}

impl<E: ?Sized> Hash for Ref<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<E: ?Sized> fmt::Debug for Ref<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref<{}>({})", short_type_name::<E>(), self.raw)
    }
}

impl<E: ?Sized> From<Ref<E>> for EntityRef {
    fn from(r: Ref<E>) -> Self {
        r.raw
    }
}

/// A simulated stateful object.
pub trait Entity: 'static {
    /// Human-readable description used by `Sim::describe` and in diagnostics.
    fn describe(&self) -> String {
        short_type_name::<Self>().to_string()
    }
}

/// An operation identifier together with its arguments.
pub trait Operation: 'static {
    /// Value handed back to a blocking caller.
    type Output: 'static;

    /// Name used in logs, event trails and per-operation counters.
    fn name() -> &'static str {
        short_type_name::<Self>()
    }
}

/// Implemented by an entity for every operation it accepts.
pub trait Handler<M: Operation>: Entity + Sized {
    fn handle(&mut self, op: M, cx: &mut Context<'_, Self, M::Output>) -> Reply<M::Output>;
}

/// How an operation completes.
pub enum Reply<T> {
    /// Finished synchronously, within the dispatching event.
    Ready(Result<T, Failure>),
    /// Continues as a process that may suspend on blocking calls.
    Blocking(LocalBoxFuture<'static, Result<T, Failure>>),
    /// The handler took the caller's continuation with [`Context::defer`] and
    /// resolves it later.
    Deferred,
}

impl<T> Reply<T> {
    pub fn ok(value: T) -> Self {
        Reply::Ready(Ok(value))
    }

    pub fn err(failure: impl Into<Failure>) -> Self {
        Reply::Ready(Err(failure.into()))
    }

    pub fn blocking<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Failure>> + 'static,
    {
        Reply::Blocking(Box::pin(future))
    }
}

impl<T> From<Result<T, Failure>> for Reply<T> {
    fn from(result: Result<T, Failure>) -> Self {
        Reply::Ready(result)
    }
}

/// Handler-side view of the controller while one event is being dispatched.
pub struct Context<'a, E, R> {
    sim: &'a Sim,
    this: Ref<E>,
    operation: &'static str,
    continuation: &'a mut Option<Box<Continuation>>,
    _reply: PhantomData<fn() -> R>,
}

impl<'a, E: Entity, R: 'static> Context<'a, E, R> {
    pub(crate) fn new(
        sim: &'a Sim,
        this: Ref<E>,
        operation: &'static str,
        continuation: &'a mut Option<Box<Continuation>>,
    ) -> Self {
        Self {
            sim,
            this,
            operation,
            continuation,
            _reply: PhantomData,
        }
    }

    pub fn sim(&self) -> &Sim {
        self.sim
    }

    /// Reference to the entity handling the operation.
    pub fn this(&self) -> Ref<E> {
        self.this
    }

    pub fn now(&self) -> Time {
        self.sim.now()
    }

    /// Advance simulation time in place; the operation keeps running.
    pub fn advance(&self, ticks: Time) -> Time {
        self.sim.advance(ticks)
    }

    /// Whether a blocking caller is waiting for this operation's result.
    pub fn has_caller(&self) -> bool {
        self.continuation.is_some()
    }

    /// Take over the caller's continuation. Return [`Reply::Deferred`] and
    /// resolve the handle once the result exists.
    pub fn defer(&mut self) -> Deferred<R> {
        Deferred::new(self.continuation.take(), self.this.raw(), self.operation)
    }
}

/// Last path segment of a type name, generics left intact.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;
    impl Entity for Probe {}

    #[test]
    fn null_ref_is_distinguished() {
        assert!(EntityRef::NULL.is_null());
        assert!(!EntityRef::new(0, 0).is_null());
        assert_eq!(EntityRef::NULL.to_string(), "null");
        assert_eq!(EntityRef::new(3, 7).to_string(), "e3:7");
    }

    #[test]
    fn typed_refs_compare_by_identity() {
        let a: Ref<Probe> = Ref::from_raw(EntityRef::new(1, 4));
        let b: Ref<Probe> = Ref::from_raw(EntityRef::new(1, 4));
        assert_eq!(a, b);
        assert_eq!(EntityRef::from(a), EntityRef::new(1, 4));
    }

    #[test]
    fn default_description_is_type_name() {
        assert_eq!(Probe.describe(), "Probe");
    }
}
