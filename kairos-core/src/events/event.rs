//! Scheduled invocation records and continuation linkage.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::alloc::Recycle;
use crate::controller::{ProcessId, Sim};
use crate::entity::{EntityRef, Failure, Handler, Operation, Ref};
use crate::error::SimulationError;
use crate::events::Scheduled;
use crate::time::Time;

/// Type-erased operation plus arguments, bound to the entity type that handles it.
pub(crate) trait Invoke {
    fn name(&self) -> &'static str;

    fn invoke(
        self: Box<Self>,
        sim: &Sim,
        target: EntityRef,
        continuation: Option<Box<Continuation>>,
    ) -> Result<(), SimulationError>;
}

pub(crate) struct Invocation<E, M> {
    op: M,
    _entity: PhantomData<fn() -> E>,
}

impl<E, M> Invocation<E, M> {
    pub(crate) fn boxed(op: M) -> Box<Self> {
        Box::new(Self {
            op,
            _entity: PhantomData,
        })
    }
}

impl<E: Handler<M>, M: Operation> Invoke for Invocation<E, M> {
    fn name(&self) -> &'static str {
        M::name()
    }

    fn invoke(
        self: Box<Self>,
        sim: &Sim,
        target: EntityRef,
        continuation: Option<Box<Continuation>>,
    ) -> Result<(), SimulationError> {
        sim.invoke_handler::<E, M>(target, self.op, continuation)
    }
}

pub(crate) type StaticFn = Box<dyn FnOnce(&Sim) -> Result<(), Failure>>;

/// What processing an event does.
pub(crate) enum Payload {
    /// Run an entity operation.
    Invoke(Box<dyn Invoke>),
    /// Hand a callee's result back to the suspended caller.
    Resume,
    /// Run a closure against the built-in static entity.
    Run(StaticFn),
    /// End-of-simulation sentinel.
    End,
}

impl Payload {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Payload::Invoke(invoke) => invoke.name(),
            Payload::Resume => "resume",
            Payload::Run(_) => "run",
            Payload::End => "end",
        }
    }
}

/// A scheduled, time-stamped invocation.
pub struct Event {
    pub(crate) time: Time,
    pub(crate) seq: u64,
    pub(crate) target: EntityRef,
    pub(crate) payload: Option<Payload>,
    pub(crate) continuation: Option<Box<Continuation>>,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            time: 0,
            seq: 0,
            target: EntityRef::NULL,
            payload: None,
            continuation: None,
        }
    }
}

impl Event {
    /// Unpooled event for collaborators feeding a controller from outside,
    /// see [`crate::remote::ControllerRemote::enqueue`].
    pub fn invocation<E: Handler<M>, M: Operation>(time: Time, target: Ref<E>, op: M) -> Box<Self> {
        Box::new(Self {
            time,
            seq: 0,
            target: target.raw(),
            payload: Some(Payload::Invoke(Invocation::<E, M>::boxed(op))),
            continuation: None,
        })
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn target(&self) -> EntityRef {
        self.target
    }

    pub fn operation(&self) -> &'static str {
        self.payload.as_ref().map_or("none", Payload::name)
    }

    /// Whether a suspended caller is linked to this event.
    pub fn has_continuation(&self) -> bool {
        self.continuation.is_some()
    }
}

impl Recycle for Event {
    fn recycle(&mut self) {
        self.time = 0;
        self.seq = 0;
        self.target = EntityRef::NULL;
        self.payload = None;
        self.continuation = None;
    }
}

impl Scheduled for Event {
    #[inline]
    fn time(&self) -> Time {
        self.time
    }

    #[inline]
    fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("time", &self.time)
            .field("seq", &self.seq)
            .field("target", &self.target)
            .field("operation", &self.operation())
            .field("continuation", &self.continuation.is_some())
            .finish()
    }
}

/// The rest of a suspended blocking operation: which process waits, on behalf
/// of which entity, and the callee's eventual result or failure.
pub struct Continuation {
    pub(crate) process: Option<ProcessId>,
    pub(crate) caller: EntityRef,
    pub(crate) result: Option<Box<dyn Any>>,
    pub(crate) failure: Option<Failure>,
}

impl Default for Continuation {
    fn default() -> Self {
        Self {
            process: None,
            caller: EntityRef::NULL,
            result: None,
            failure: None,
        }
    }
}

impl Continuation {
    pub(crate) fn take_outcome(&mut self) -> Option<Result<Box<dyn Any>, Failure>> {
        match (self.result.take(), self.failure.take()) {
            (_, Some(failure)) => Some(Err(failure)),
            (Some(value), None) => Some(Ok(value)),
            (None, None) => None,
        }
    }

    pub(crate) fn set_outcome(&mut self, outcome: Result<Box<dyn Any>, Failure>) {
        match outcome {
            Ok(value) => self.result = Some(value),
            Err(failure) => self.failure = Some(failure),
        }
    }
}

impl Recycle for Continuation {
    fn recycle(&mut self) {
        self.process = None;
        self.caller = EntityRef::NULL;
        self.result = None;
        self.failure = None;
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("process", &self.process)
            .field("caller", &self.caller)
            .field("has_result", &self.result.is_some())
            .field("has_failure", &self.failure.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Pool;

    #[test]
    fn recycled_event_is_cleared() {
        let mut pool: Pool<Event> = Pool::new(1);
        let mut event = pool.get();
        event.time = 42;
        event.seq = 9;
        event.target = EntityRef::new(0, 3);
        event.payload = Some(Payload::End);
        event.continuation = Some(Box::default());
        pool.put(event);

        let event = pool.get();
        assert_eq!(event.time(), 0);
        assert!(event.target().is_null());
        assert_eq!(event.operation(), "none");
        assert!(!event.has_continuation());
    }

    #[test]
    fn continuation_outcome_round_trip() {
        let mut cont = Continuation::default();
        cont.set_outcome(Ok(Box::new(5u32)));
        let value = cont.take_outcome().unwrap().unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&5));
        assert!(cont.take_outcome().is_none());

        cont.set_outcome(Err(anyhow::anyhow!("boom")));
        let failure = cont.take_outcome().unwrap().unwrap_err();
        assert_eq!(failure.to_string(), "boom");
    }
}
