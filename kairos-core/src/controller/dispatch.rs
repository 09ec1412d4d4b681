//! The run loop: `Idle -> Running -> Draining -> Halted`.

use std::any::Any;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::{RunState, RunSummary, Sim};
use crate::entity::{Context, EntityRef, Failure, Handler, Operation, Ref, Reply};
use crate::error::{SimulationError, UsageError};
use crate::events::{Continuation, Event, Payload, SchedulerError};
use crate::time::{Time, END};

/// Sees every dispatched event, in processing order.
pub trait EventObserver {
    fn on_dispatch(&mut self, time: Time, target: EntityRef, operation: &'static str);
}

impl<F: FnMut(Time, EntityRef, &'static str)> EventObserver for F {
    fn on_dispatch(&mut self, time: Time, target: EntityRef, operation: &'static str) {
        self(time, target, operation)
    }
}

impl Sim {
    /// Run until the end sentinel or an empty queue, then drain events at [`END`].
    ///
    /// A controller runs once. Any error clears the queue and halts it.
    pub fn run(&self) -> Result<RunSummary, SimulationError> {
        let started = Instant::now();
        let end_time = {
            let mut kernel = self.inner.kernel.borrow_mut();
            if kernel.state != RunState::Idle {
                return Err(UsageError::NotIdle(kernel.state).into());
            }
            kernel.state = RunState::Running;
            let end_time = kernel.end_time.max(self.now());
            let target = self.static_ref();
            let event = kernel.event(end_time, target, Payload::End, None);
            kernel.push(event);
            end_time
        };
        if let Some(probe) = self.inner.probe.borrow().as_ref() {
            probe.set_end_time(end_time);
            probe.set_running(true);
        }
        info!(
            controller = self.inner.id,
            queued = self.queue_len(),
            end = %self.format_time(end_time),
            "simulation running"
        );

        let outcome = self.dispatch_loop();
        self.halt();

        match outcome {
            Ok(()) => {
                let summary = self.summary(started.elapsed());
                summary.log(&self.time_unit());
                Ok(summary)
            }
            Err(err) => {
                error!(controller = self.inner.id, error = %err, "simulation aborted");
                Err(err)
            }
        }
    }

    fn next_event(&self) -> Option<Box<Event>> {
        match self.inner.kernel.borrow_mut().scheduler.remove_first() {
            Ok(event) => Some(event),
            Err(SchedulerError::Empty) => None,
        }
    }

    fn dispatch_loop(&self) -> Result<(), SimulationError> {
        while let Some(event) = self.next_event() {
            if matches!(event.payload, Some(Payload::End)) {
                debug!(time = event.time, "end of simulation reached");
                self.release(event);
                break;
            }
            self.dispatch(event)?;
        }

        self.inner.kernel.borrow_mut().state = RunState::Draining;
        // cleanup at END must not show up as the final simulation time
        let last_event_time = self.now();
        let drained = self.drain();
        self.inner.clock.set(last_event_time);
        drained
    }

    fn drain(&self) -> Result<(), SimulationError> {
        while let Some(event) = self.next_event() {
            let is_end = matches!(event.payload, Some(Payload::End));
            if is_end || event.time < END {
                if !is_end {
                    debug!(
                        time = event.time,
                        target = %event.target,
                        operation = event.operation(),
                        "discarding event past the end of simulation"
                    );
                    self.inner.kernel.borrow_mut().discarded += 1;
                }
                self.release(event);
                continue;
            }
            self.dispatch(event)?;
        }
        Ok(())
    }

    fn release(&self, event: Box<Event>) {
        self.inner.kernel.borrow_mut().events.put(event);
    }

    fn dispatch(&self, mut event: Box<Event>) -> Result<(), SimulationError> {
        let time = event.time;
        let target = event.target;
        let payload = event.payload.take();
        let continuation = event.continuation.take();
        self.release(event);

        let payload = payload.ok_or_else(|| {
            SimulationError::Fatal(format!("event at t={time} for {target} carries no operation"))
        })?;
        let operation = payload.name();
        self.inner.clock.set(time);
        {
            let mut kernel = self.inner.kernel.borrow_mut();
            kernel.processed += 1;
            kernel.trail.record(time, target, operation);
            if let Some(counts) = kernel.counts.as_mut() {
                *counts.entry(operation).or_default() += 1;
            }
        }
        if let Some(observer) = self.inner.observer.borrow_mut().as_mut() {
            observer.on_dispatch(time, target, operation);
        }

        let started = Instant::now();
        let outcome = match payload {
            Payload::Invoke(invoke) => invoke.invoke(self, target, continuation),
            Payload::Resume => self.resume(continuation),
            Payload::Run(f) => {
                f(self).map_err(|failure| self.application_error(target, operation, failure))
            }
            Payload::End => Ok(()),
        };
        let raised = self.inner.kernel.borrow_mut().raised.take();
        let outcome = outcome.and_then(|()| raised.map_or(Ok(()), Err));

        self.publish(started);
        outcome
    }

    fn publish(&self, started: Instant) {
        let (queued, processed) = {
            let kernel = self.inner.kernel.borrow();
            (kernel.scheduler.len(), kernel.processed)
        };
        if let Some(probe) = self.inner.probe.borrow().as_ref() {
            probe.publish(self.now(), queued, processed);
        }
        if let Some(metrics) = self.inner.metrics.borrow().as_ref() {
            let latency = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
            metrics.record_dispatch(queued, latency);
        }
    }

    /// Release every pending event and suspended process.
    fn halt(&self) {
        let abandoned = std::mem::take(&mut *self.inner.processes.borrow_mut());
        let (pending, processes) = {
            let mut kernel = self.inner.kernel.borrow_mut();
            let pending = kernel.scheduler.len();
            kernel.scheduler.clear();
            kernel.state = RunState::Halted;
            (pending, abandoned.len())
        };
        drop(abandoned);
        if pending > 0 || processes > 0 {
            debug!(pending, processes, "released unfinished work at halt");
        }
        if let Some(probe) = self.inner.probe.borrow().as_ref() {
            probe.set_running(false);
        }
    }

    /// Run `op` against the entity behind `target`, then route its reply.
    pub(crate) fn invoke_handler<E: Handler<M>, M: Operation>(
        &self,
        target: EntityRef,
        op: M,
        continuation: Option<Box<Continuation>>,
    ) -> Result<(), SimulationError> {
        let cell = self.entity::<E>(target)?;
        let mut continuation = continuation;
        let reply = {
            let mut entity = cell
                .try_borrow_mut()
                .map_err(|_| UsageError::EntityBusy(target))?;
            let mut cx = Context::new(self, Ref::from_raw(target), M::name(), &mut continuation);
            entity.handle(op, &mut cx)
        };
        self.settle(reply, continuation, target, M::name())
    }

    fn settle<T: 'static>(
        &self,
        reply: Reply<T>,
        continuation: Option<Box<Continuation>>,
        target: EntityRef,
        operation: &'static str,
    ) -> Result<(), SimulationError> {
        match reply {
            Reply::Ready(outcome) => {
                let outcome = outcome.map(|value| Box::new(value) as Box<dyn Any>);
                self.complete(continuation, outcome, target, operation)
            }
            Reply::Blocking(future) => self.spawn(
                Box::pin(async move { future.await.map(|value| Box::new(value) as Box<dyn Any>) }),
                continuation,
                target,
                operation,
            ),
            Reply::Deferred => {
                if continuation.is_some() {
                    warn!(
                        %target,
                        operation,
                        "deferred without taking the continuation; the caller will never resume"
                    );
                }
                Ok(())
            }
        }
    }

    /// Record an error raised where it cannot be returned; the loop stops after
    /// the current event. The first one wins.
    pub(crate) fn raise(&self, err: SimulationError) {
        let mut kernel = self.inner.kernel.borrow_mut();
        if kernel.raised.is_none() {
            kernel.raised = Some(err);
        }
    }

    pub(crate) fn application_error(
        &self,
        target: EntityRef,
        operation: &'static str,
        failure: Failure,
    ) -> SimulationError {
        let unit = self.time_unit();
        SimulationError::Application {
            time: self.now(),
            target,
            operation: operation.to_string(),
            failure,
            trail: self.inner.kernel.borrow().trail.lines(&unit),
        }
    }

    fn summary(&self, wall: std::time::Duration) -> RunSummary {
        let kernel = self.inner.kernel.borrow();
        RunSummary {
            events: kernel.processed,
            discarded: kernel.discarded,
            sim_time: self.now(),
            wall,
            operations: kernel.counts.clone().unwrap_or_default(),
            pending_continuations: kernel.live_continuations,
            event_pool: kernel.events.stats(),
            continuation_pool: kernel.continuations.stats(),
        }
    }
}
