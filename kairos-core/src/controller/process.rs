//! Suspended blocking operations and the futures that drive them.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{self, Poll};

use anyhow::anyhow;
use futures::future::LocalBoxFuture;
use futures::task::noop_waker;
use tracing::warn;

use super::Sim;
use crate::entity::{EntityRef, Failure};
use crate::error::{SimulationError, UsageError};
use crate::events::{Continuation, Invoke, Payload};

/// Slot of a suspended process in its controller's process table.
pub type ProcessId = usize;

pub(crate) type ProcessFuture = LocalBoxFuture<'static, Result<Box<dyn Any>, Failure>>;
type Outcome = Result<Box<dyn Any>, Failure>;

pub(crate) struct Process {
    /// `None` while the process is being polled.
    future: Option<ProcessFuture>,
    /// Caller waiting on this process's own result.
    continuation: Option<Box<Continuation>>,
    resume: Option<Outcome>,
    /// A blocking call is registered and not yet resumed.
    waiting: bool,
    entity: EntityRef,
    operation: &'static str,
}

#[derive(Default)]
pub(crate) struct ProcessTable {
    slots: Vec<Option<Process>>,
    free: Vec<ProcessId>,
    live: usize,
}

impl ProcessTable {
    fn insert(&mut self, process: Process) -> ProcessId {
        self.live += 1;
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(process);
                id
            }
            None => {
                self.slots.push(Some(process));
                self.slots.len() - 1
            }
        }
    }

    fn get_mut(&mut self, id: ProcessId) -> Option<&mut Process> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    fn remove(&mut self, id: ProcessId) -> Option<Process> {
        let process = self.slots.get_mut(id)?.take()?;
        self.free.push(id);
        self.live -= 1;
        Some(process)
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }
}

impl Sim {
    /// Start a blocking operation as a process and run it to its first suspension.
    pub(super) fn spawn(
        &self,
        future: ProcessFuture,
        continuation: Option<Box<Continuation>>,
        entity: EntityRef,
        operation: &'static str,
    ) -> Result<(), SimulationError> {
        let id = self.inner.processes.borrow_mut().insert(Process {
            future: Some(future),
            continuation,
            resume: None,
            waiting: false,
            entity,
            operation,
        });
        self.poll_process(id)
    }

    pub(super) fn poll_process(&self, id: ProcessId) -> Result<(), SimulationError> {
        let mut future = {
            let mut processes = self.inner.processes.borrow_mut();
            let process = processes.get_mut(id).ok_or_else(|| {
                SimulationError::Fatal(format!("no process {id} for resumed continuation"))
            })?;
            process.future.take().ok_or_else(|| {
                SimulationError::Fatal(format!("process {id} resumed while already running"))
            })?
        };

        let outer = self.inner.current.replace(Some(id));
        let waker = noop_waker();
        let mut cx = task::Context::from_waker(&waker);
        let poll = future.as_mut().poll(&mut cx);
        self.inner.current.set(outer);

        match poll {
            Poll::Pending => {
                let mut processes = self.inner.processes.borrow_mut();
                if let Some(process) = processes.get_mut(id) {
                    if !process.waiting {
                        warn!(
                            process = id,
                            operation = process.operation,
                            "process suspended without a blocking call; it will never resume"
                        );
                    }
                    process.future = Some(future);
                }
                Ok(())
            }
            Poll::Ready(outcome) => {
                drop(future);
                let process = self
                    .inner
                    .processes
                    .borrow_mut()
                    .remove(id)
                    .ok_or_else(|| SimulationError::Fatal(format!("process {id} vanished")))?;
                self.complete(
                    process.continuation,
                    outcome,
                    process.entity,
                    process.operation,
                )
            }
        }
    }

    /// Register a blocking call for the running process and queue the outbound event.
    fn register_call(
        &self,
        target: EntityRef,
        invoke: Box<dyn Invoke>,
    ) -> Result<ProcessId, UsageError> {
        let id = self.inner.current.get().ok_or(UsageError::NotInProcess)?;
        let caller = {
            let mut processes = self.inner.processes.borrow_mut();
            let process = processes.get_mut(id).ok_or(UsageError::NotInProcess)?;
            if process.waiting {
                return Err(UsageError::ConcurrentCall);
            }
            process.waiting = true;
            process.entity
        };

        let now = self.now();
        {
            let mut kernel = self.inner.kernel.borrow_mut();
            let mut continuation = kernel.continuations.get();
            continuation.process = Some(id);
            continuation.caller = caller;
            kernel.live_continuations += 1;
            let event = kernel.event(now, target, Payload::Invoke(invoke), Some(continuation));
            kernel.push(event);
        }
        if let Some(metrics) = self.inner.metrics.borrow().as_ref() {
            metrics.inc_blocking_calls();
        }
        Ok(id)
    }

    fn take_resume(&self, id: ProcessId) -> Option<Outcome> {
        let mut processes = self.inner.processes.borrow_mut();
        let process = processes.get_mut(id)?;
        let outcome = process.resume.take()?;
        process.waiting = false;
        Some(outcome)
    }

    /// Deliver a callee's outcome to the process waiting in `continuation`.
    pub(super) fn resume(&self, continuation: Option<Box<Continuation>>) -> Result<(), SimulationError> {
        let mut continuation = continuation
            .ok_or_else(|| SimulationError::Fatal("resume event without continuation".into()))?;
        let id = continuation
            .process
            .ok_or_else(|| SimulationError::Fatal("continuation has no process".into()))?;
        let outcome = continuation
            .take_outcome()
            .ok_or_else(|| SimulationError::Fatal(format!("process {id} resumed without a result")))?;
        {
            let mut kernel = self.inner.kernel.borrow_mut();
            kernel.live_continuations = kernel.live_continuations.saturating_sub(1);
            kernel.continuations.put(continuation);
        }
        self.inner
            .processes
            .borrow_mut()
            .get_mut(id)
            .ok_or_else(|| SimulationError::Fatal(format!("no matching continuation frame for process {id}")))?
            .resume = Some(outcome);
        self.poll_process(id)
    }

    /// Route an operation's outcome: to the waiting caller if there is one,
    /// otherwise a failure aborts the run.
    pub(crate) fn complete(
        &self,
        continuation: Option<Box<Continuation>>,
        outcome: Outcome,
        origin: EntityRef,
        operation: &'static str,
    ) -> Result<(), SimulationError> {
        match continuation {
            Some(mut continuation) => {
                continuation.set_outcome(outcome);
                let caller = continuation.caller;
                self.schedule(self.now(), caller, Payload::Resume, Some(continuation))?;
                Ok(())
            }
            None => match outcome {
                Ok(_) => Ok(()),
                Err(failure) => Err(self.application_error(origin, operation, failure)),
            },
        }
    }
}

enum CallState {
    Unsent {
        target: EntityRef,
        invoke: Box<dyn Invoke>,
    },
    Registered(ProcessId),
    Finished,
}

/// Future of a blocking call. Resolves to the callee's result, or to the
/// failure the callee raised, at the simulation time the callee completed.
#[must_use = "a blocking call does nothing unless awaited"]
pub struct Call<R> {
    sim: Sim,
    state: CallState,
    _output: PhantomData<fn() -> R>,
}

impl<R: 'static> Call<R> {
    pub(crate) fn new(sim: Sim, target: EntityRef, invoke: Box<dyn Invoke>) -> Self {
        Self {
            sim,
            state: CallState::Unsent { target, invoke },
            _output: PhantomData,
        }
    }
}

impl<R: 'static> Future for Call<R> {
    type Output = Result<R, Failure>;

    fn poll(self: Pin<&mut Self>, _cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match std::mem::replace(&mut this.state, CallState::Finished) {
            CallState::Unsent { target, invoke } => match this.sim.register_call(target, invoke) {
                Ok(id) => {
                    this.state = CallState::Registered(id);
                    Poll::Pending
                }
                Err(err) => Poll::Ready(Err(err.into())),
            },
            CallState::Registered(id) => match this.sim.take_resume(id) {
                None => {
                    this.state = CallState::Registered(id);
                    Poll::Pending
                }
                Some(Ok(value)) => Poll::Ready(value.downcast::<R>().map(|value| *value).map_err(
                    |_| {
                        let message = format!("process {id} resumed with a value of the wrong type");
                        this.sim.raise(SimulationError::Fatal(message.clone()));
                        anyhow!(message)
                    },
                )),
                Some(Err(failure)) => Poll::Ready(Err(failure)),
            },
            CallState::Finished => Poll::Ready(Err(anyhow!("blocking call polled after completion"))),
        }
    }
}

/// A caller's continuation taken over by a handler; resolve it exactly once.
#[must_use = "the caller stays suspended until this is resolved"]
pub struct Deferred<T> {
    continuation: Option<Box<Continuation>>,
    origin: EntityRef,
    operation: &'static str,
    _value: PhantomData<fn(T)>,
}

impl<T: 'static> Deferred<T> {
    pub(crate) fn new(
        continuation: Option<Box<Continuation>>,
        origin: EntityRef,
        operation: &'static str,
    ) -> Self {
        Self {
            continuation,
            origin,
            operation,
            _value: PhantomData,
        }
    }

    /// Whether anybody is waiting; `false` when the operation was sent non-blocking.
    pub fn has_caller(&self) -> bool {
        self.continuation.is_some()
    }

    /// Resume the caller at the current time. A failure with no caller aborts the run.
    pub fn resolve(mut self, sim: &Sim, outcome: Result<T, Failure>) {
        let outcome = outcome.map(|value| Box::new(value) as Box<dyn Any>);
        if let Err(err) = sim.complete(
            self.continuation.take(),
            outcome,
            self.origin,
            self.operation,
        ) {
            sim.raise(err);
        }
    }

    pub fn ok(self, sim: &Sim, value: T) {
        self.resolve(sim, Ok(value));
    }

    pub fn fail(self, sim: &Sim, failure: impl Into<Failure>) {
        self.resolve(sim, Err(failure.into()));
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("origin", &self.origin)
            .field("operation", &self.operation)
            .field("has_caller", &self.continuation.is_some())
            .finish()
    }
}
