//! ## kairos-core::controller
//! **The dispatch loop and the call/return protocol**
//!
//! A [`Sim`] is one controller: it owns the scheduler, the entity registry,
//! the clock and the table of suspended processes. It is a cheap, cloneable
//! handle passed explicitly to everything that needs it; several controllers
//! can coexist in one thread.
//!
//! ### Blocking calls
//! An operation that needs to block replies with [`Reply::Blocking`] and a
//! future. The controller runs that future as a *process*. Awaiting a
//! [`Call`] inside it registers a continuation, schedules the outbound event
//! at the current time and suspends the process. When the callee completes,
//! a resume event is scheduled at the then-current time; dispatching it hands
//! the result (or failure) to the process and polls it again.
//!
//! ### Expectations:
//! - Single-threaded; nothing here is `Send`
//! - No registry, kernel or entity borrow is held while application code runs
//!
//! [`Reply::Blocking`]: crate::entity::Reply::Blocking

mod dispatch;
mod process;
mod summary;
mod trail;

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use kairos_config::ControllerConfig;
use kairos_telemetry::{MetricsRecorder, ProgressProbe};
use serde::Serialize;
use tracing::{debug, trace};

pub use dispatch::EventObserver;
pub use process::{Call, Deferred, ProcessId};
pub use summary::RunSummary;
pub use trail::{EventTrail, TrailEntry};

use crate::alloc::{Pool, PoolStats};
use crate::entity::{short_type_name, Entity, EntityRef, Failure, Handler, Operation, Ref};
use crate::error::UsageError;
use crate::events::{scheduler, Continuation, Event, Invocation, Payload, Scheduler};
use crate::log::LogSink;
use crate::sleep::{Sleeper, Static};
use crate::time::{SimClock, Time, TimeUnit, END};
use process::ProcessTable;

static NEXT_CONTROLLER: AtomicU32 = AtomicU32::new(0);

/// Registry index of the built-in entity that static closures run against.
pub(crate) const STATIC_INDEX: u32 = 0;
/// Registry index of the built-in entity behind [`Sim::sleep_block`].
pub(crate) const SLEEPER_INDEX: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Running,
    /// Past the end sentinel; only events at [`END`] still run.
    Draining,
    Halted,
}

pub(crate) struct Kernel {
    scheduler: Box<dyn Scheduler<Box<Event>>>,
    events: Pool<Event>,
    continuations: Pool<Continuation>,
    next_seq: u64,
    end_time: Time,
    state: RunState,
    live_continuations: usize,
    processed: u64,
    discarded: u64,
    raised: Option<crate::error::SimulationError>,
    trail: EventTrail,
    counts: Option<BTreeMap<&'static str, u64>>,
}

impl Kernel {
    /// Stamp the next sequence number and queue the event.
    fn push(&mut self, mut event: Box<Event>) {
        event.seq = self.next_seq;
        self.next_seq += 1;
        trace!(
            time = event.time,
            seq = event.seq,
            target = %event.target,
            operation = event.operation(),
            "scheduled"
        );
        self.scheduler.insert(event);
    }

    fn event(
        &mut self,
        time: Time,
        target: EntityRef,
        payload: Payload,
        continuation: Option<Box<Continuation>>,
    ) -> Box<Event> {
        let mut event = self.events.get();
        event.time = time;
        event.target = target;
        event.payload = Some(payload);
        event.continuation = continuation;
        event
    }
}

struct Slot {
    cell: Rc<dyn Any>,
    describe: fn(&dyn Any) -> Option<String>,
    type_name: &'static str,
}

impl Slot {
    fn new<E: Entity>(entity: E) -> Self {
        Self {
            cell: Rc::new(RefCell::new(entity)),
            describe: describe_slot::<E>,
            type_name: short_type_name::<E>(),
        }
    }
}

fn describe_slot<E: Entity>(cell: &dyn Any) -> Option<String> {
    let cell = cell.downcast_ref::<RefCell<E>>()?;
    Some(match cell.try_borrow() {
        Ok(entity) => entity.describe(),
        Err(_) => format!("{} (running)", short_type_name::<E>()),
    })
}

struct SimInner {
    id: u32,
    clock: SimClock,
    kernel: RefCell<Kernel>,
    registry: RefCell<Vec<Slot>>,
    processes: RefCell<ProcessTable>,
    current: Cell<Option<ProcessId>>,
    unit: RefCell<TimeUnit>,
    logger: RefCell<Option<Box<dyn LogSink>>>,
    observer: RefCell<Option<Box<dyn EventObserver>>>,
    probe: RefCell<Option<Arc<ProgressProbe>>>,
    metrics: RefCell<Option<Arc<MetricsRecorder>>>,
}

/// Handle to one simulation controller.
#[derive(Clone)]
pub struct Sim {
    inner: Rc<SimInner>,
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

impl Sim {
    pub fn new() -> Self {
        Self::from_config(&ControllerConfig::default())
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        let id = NEXT_CONTROLLER.fetch_add(1, Ordering::Relaxed);
        let kernel = Kernel {
            scheduler: scheduler::from_config(&config.scheduler),
            events: Pool::new(config.pools.event_capacity),
            continuations: Pool::new(config.pools.continuation_capacity),
            next_seq: 0,
            end_time: config.end_at.unwrap_or(END - 1),
            state: RunState::Idle,
            live_continuations: 0,
            processed: 0,
            discarded: 0,
            raised: None,
            trail: EventTrail::new(config.trail_depth),
            counts: config.count_events.then(BTreeMap::new),
        };
        let sim = Sim {
            inner: Rc::new(SimInner {
                id,
                clock: SimClock::new(0),
                kernel: RefCell::new(kernel),
                registry: RefCell::new(Vec::new()),
                processes: RefCell::new(ProcessTable::default()),
                current: Cell::new(None),
                unit: RefCell::new(TimeUnit::new(
                    config.time_unit.ticks,
                    config.time_unit.label.clone(),
                )),
                logger: RefCell::new(None),
                observer: RefCell::new(None),
                probe: RefCell::new(None),
                metrics: RefCell::new(None),
            }),
        };
        sim.create(Static);
        sim.create(Sleeper);
        debug!(
            controller = id,
            scheduler = ?config.scheduler.kind,
            "controller created"
        );
        sim
    }

    /// Controller identity carried by every [`EntityRef`] it hands out.
    pub fn id(&self) -> u32 {
        self.inner.id
    }

    /// Register an entity. Registry growth is monotonic; indices are never reused.
    pub fn create<E: Entity>(&self, entity: E) -> Ref<E> {
        let mut registry = self.inner.registry.borrow_mut();
        let index = registry.len() as u32;
        registry.push(Slot::new(entity));
        let entity = EntityRef::new(self.inner.id, index);
        trace!(%entity, kind = short_type_name::<E>(), "entity registered");
        Ref::from_raw(entity)
    }

    pub(crate) fn entity<E: Entity>(&self, target: EntityRef) -> Result<Rc<RefCell<E>>, UsageError> {
        if target.is_null() {
            return Err(UsageError::UnknownEntity(target));
        }
        if target.controller() != self.inner.id {
            return Err(UsageError::ForeignEntity(target));
        }
        let registry = self.inner.registry.borrow();
        let slot = registry
            .get(target.index() as usize)
            .ok_or(UsageError::UnknownEntity(target))?;
        Rc::clone(&slot.cell)
            .downcast::<RefCell<E>>()
            .map_err(|_| UsageError::TypeMismatch {
                entity: target,
                expected: short_type_name::<E>(),
                actual: slot.type_name,
            })
    }

    /// Borrow an entity's state between events, or from a blocking process.
    pub fn with<E: Entity, R>(
        &self,
        target: Ref<E>,
        f: impl FnOnce(&mut E) -> R,
    ) -> Result<R, UsageError> {
        let cell = self.entity::<E>(target.raw())?;
        let mut entity = cell
            .try_borrow_mut()
            .map_err(|_| UsageError::EntityBusy(target.raw()))?;
        Ok(f(&mut entity))
    }

    fn slot<R>(&self, target: EntityRef, f: impl FnOnce(&Slot) -> R) -> Result<R, UsageError> {
        if target.controller() != self.inner.id {
            return Err(UsageError::ForeignEntity(target));
        }
        let registry = self.inner.registry.borrow();
        registry
            .get(target.index() as usize)
            .map(f)
            .ok_or(UsageError::UnknownEntity(target))
    }

    /// Render an entity with its [`Entity::describe`]. The registry is released
    /// first, so `describe` may itself use the controller.
    pub fn describe(&self, target: EntityRef) -> Result<String, UsageError> {
        let (cell, describe) = self.slot(target, |slot| (Rc::clone(&slot.cell), slot.describe))?;
        describe(cell.as_ref()).ok_or(UsageError::UnknownEntity(target))
    }

    pub fn entity_type_name(&self, target: EntityRef) -> Result<&'static str, UsageError> {
        self.slot(target, |slot| slot.type_name)
    }

    pub fn entity_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    pub(crate) fn static_ref(&self) -> EntityRef {
        EntityRef::new(self.inner.id, STATIC_INDEX)
    }

    pub(crate) fn sleeper(&self) -> Ref<Sleeper> {
        Ref::from_raw(EntityRef::new(self.inner.id, SLEEPER_INDEX))
    }

    pub(crate) fn schedule(
        &self,
        time: Time,
        target: EntityRef,
        payload: Payload,
        continuation: Option<Box<Continuation>>,
    ) -> Result<(), UsageError> {
        let now = self.now();
        if time < now {
            return Err(UsageError::ScheduleInPast { time, now });
        }
        let mut kernel = self.inner.kernel.borrow_mut();
        let event = kernel.event(time, target, payload, continuation);
        kernel.push(event);
        Ok(())
    }

    /// Queue `op` on `target` at absolute `time`, without waiting for a result.
    pub fn schedule_at<E: Handler<M>, M: Operation>(
        &self,
        target: Ref<E>,
        op: M,
        time: Time,
    ) -> Result<(), UsageError> {
        self.schedule(
            time,
            target.raw(),
            Payload::Invoke(Invocation::<E, M>::boxed(op)),
            None,
        )
    }

    /// Non-blocking invocation at the current time. A returned value is dropped.
    pub fn send<E: Handler<M>, M: Operation>(&self, target: Ref<E>, op: M) -> Result<(), UsageError> {
        self.schedule_at(target, op, self.now())
    }

    pub fn send_after<E: Handler<M>, M: Operation>(
        &self,
        target: Ref<E>,
        op: M,
        delay: Time,
    ) -> Result<(), UsageError> {
        self.schedule_at(target, op, self.now().saturating_add(delay))
    }

    /// Blocking invocation. Await the returned future from inside a blocking operation.
    pub fn call<E: Handler<M>, M: Operation>(&self, target: Ref<E>, op: M) -> Call<M::Output> {
        Call::new(self.clone(), target.raw(), Invocation::<E, M>::boxed(op))
    }

    /// Run a closure at `time` on behalf of no particular entity.
    pub fn run_at<F>(&self, time: Time, f: F) -> Result<(), UsageError>
    where
        F: FnOnce(&Sim) -> Result<(), Failure> + 'static,
    {
        self.schedule(time, self.static_ref(), Payload::Run(Box::new(f)), None)
    }

    #[inline]
    pub fn now(&self) -> Time {
        self.inner.clock.now()
    }

    /// Advance time in place; the calling operation keeps running.
    pub fn advance(&self, ticks: Time) -> Time {
        self.inner.clock.advance(ticks)
    }

    /// End the simulation one tick from now.
    pub fn end(&self) {
        self.end_at(self.now().saturating_add(1));
    }

    /// Schedule the end sentinel at `time`, clamped to the current time.
    /// The earliest requested end wins.
    pub fn end_at(&self, time: Time) {
        let time = time.max(self.now());
        let end_time = {
            let mut kernel = self.inner.kernel.borrow_mut();
            kernel.end_time = kernel.end_time.min(time);
            let target = self.static_ref();
            let event = kernel.event(time, target, Payload::End, None);
            kernel.push(event);
            kernel.end_time
        };
        if let Some(probe) = self.inner.probe.borrow().as_ref() {
            probe.set_end_time(end_time);
        }
    }

    pub fn end_time(&self) -> Time {
        self.inner.kernel.borrow().end_time
    }

    pub fn set_time_unit(&self, ticks: u64, label: impl Into<String>) {
        *self.inner.unit.borrow_mut() = TimeUnit::new(ticks, label);
    }

    pub fn time_unit(&self) -> TimeUnit {
        self.inner.unit.borrow().clone()
    }

    /// Current time rendered in the configured unit.
    pub fn time_string(&self) -> String {
        self.format_time(self.now())
    }

    pub fn format_time(&self, time: Time) -> String {
        self.inner.unit.borrow().format(time)
    }

    pub fn set_logger(&self, sink: impl LogSink + 'static) {
        *self.inner.logger.borrow_mut() = Some(Box::new(sink));
    }

    pub fn clear_logger(&self) {
        self.inner.logger.borrow_mut().take();
    }

    /// Hand a line to the application log sink; dropped when none is set.
    pub fn log(&self, message: impl AsRef<str>) {
        if let Some(sink) = self.inner.logger.borrow().as_ref() {
            sink.log(self.now(), message.as_ref());
        }
    }

    pub fn set_observer(&self, observer: impl EventObserver + 'static) {
        *self.inner.observer.borrow_mut() = Some(Box::new(observer));
    }

    pub fn set_probe(&self, probe: Arc<ProgressProbe>) {
        probe.set_end_time(self.end_time());
        *self.inner.probe.borrow_mut() = Some(probe);
    }

    pub fn set_metrics(&self, metrics: Arc<MetricsRecorder>) {
        *self.inner.metrics.borrow_mut() = Some(metrics);
    }

    pub fn state(&self) -> RunState {
        self.inner.kernel.borrow().state
    }

    pub fn queue_len(&self) -> usize {
        self.inner.kernel.borrow().scheduler.len()
    }

    /// Continuations registered by blocking calls and not yet consumed by a resume.
    pub fn pending_continuations(&self) -> usize {
        self.inner.kernel.borrow().live_continuations
    }

    /// Blocking operations currently suspended.
    pub fn live_processes(&self) -> usize {
        self.inner.processes.borrow().len()
    }

    pub fn processed_events(&self) -> u64 {
        self.inner.kernel.borrow().processed
    }

    /// Event and continuation pool statistics, in that order.
    pub fn pool_stats(&self) -> (PoolStats, PoolStats) {
        let kernel = self.inner.kernel.borrow();
        (kernel.events.stats(), kernel.continuations.stats())
    }
}
