//! Narrow surface through which another controller, or a transport standing
//! in for one, can address this controller's entities. Only the local
//! implementation ships here; moving events across processes belongs to the
//! transport.

use tracing::debug;

use crate::controller::Sim;
use crate::entity::EntityRef;
use crate::error::UsageError;
use crate::events::Event;
use crate::time::Time;

pub trait ControllerRemote {
    /// Queue an event built elsewhere. Remote events never carry a continuation.
    fn enqueue(&self, event: Box<Event>) -> Result<(), UsageError>;

    fn entity_type_name(&self, entity: EntityRef) -> Result<&'static str, UsageError>;

    fn describe_entity(&self, entity: EntityRef) -> Result<String, UsageError>;

    fn end_at(&self, time: Time);

    fn set_time_unit(&self, ticks: u64, label: &str);

    fn log(&self, message: &str);
}

impl ControllerRemote for Sim {
    fn enqueue(&self, mut event: Box<Event>) -> Result<(), UsageError> {
        let target = event.target();
        if target.controller() != self.id() {
            return Err(UsageError::ForeignEntity(target));
        }
        let payload = event
            .payload
            .take()
            .ok_or(UsageError::UnknownEntity(target))?;
        debug!(time = event.time(), %target, operation = payload.name(), "remote enqueue");
        self.schedule(event.time(), target, payload, None)
    }

    fn entity_type_name(&self, entity: EntityRef) -> Result<&'static str, UsageError> {
        Sim::entity_type_name(self, entity)
    }

    fn describe_entity(&self, entity: EntityRef) -> Result<String, UsageError> {
        self.describe(entity)
    }

    fn end_at(&self, time: Time) {
        Sim::end_at(self, time)
    }

    fn set_time_unit(&self, ticks: u64, label: &str) {
        Sim::set_time_unit(self, ticks, label)
    }

    fn log(&self, message: &str) {
        Sim::log(self, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Context, Entity, Handler, Operation, Reply};
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counter {
        hits: Rc<Cell<u32>>,
    }

    impl Entity for Counter {
        fn describe(&self) -> String {
            format!("counter({})", self.hits.get())
        }
    }

    struct Hit;
    impl Operation for Hit {
        type Output = ();
    }

    impl Handler<Hit> for Counter {
        fn handle(&mut self, _op: Hit, _cx: &mut Context<'_, Self, ()>) -> Reply<()> {
            self.hits.set(self.hits.get() + 1);
            Reply::ok(())
        }
    }

    fn remote(sim: &Sim) -> &dyn ControllerRemote {
        sim
    }

    #[test]
    fn remote_events_are_dispatched_locally() {
        let sim = Sim::new();
        let hits = Rc::new(Cell::new(0));
        let counter = sim.create(Counter { hits: hits.clone() });

        let link = remote(&sim);
        link.enqueue(Event::invocation(4, counter, Hit)).unwrap();
        link.enqueue(Event::invocation(9, counter, Hit)).unwrap();
        link.set_time_unit(2, " half-ticks");
        assert_eq!(link.entity_type_name(counter.raw()).unwrap(), "Counter");

        sim.run().unwrap();
        assert_eq!(hits.get(), 2);
        assert_eq!(link.describe_entity(counter.raw()).unwrap(), "counter(2)");
        assert_eq!(sim.time_string(), "4 half-ticks");
    }

    #[test]
    fn foreign_targets_are_rejected() {
        let here = Sim::new();
        let there = Sim::new();
        let counter = there.create(Counter {
            hits: Rc::new(Cell::new(0)),
        });
        let err = remote(&here)
            .enqueue(Event::invocation(0, counter, Hit))
            .unwrap_err();
        assert_eq!(err, UsageError::ForeignEntity(counter.raw()));
    }
}
