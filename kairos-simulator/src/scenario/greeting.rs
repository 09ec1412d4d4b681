use std::cell::RefCell;
use std::rc::Rc;

use kairos_core::prelude::*;

use crate::driver::Bootstrap;

/// One entity greets, advances time by one tick and greets again through the
/// queue, `rounds` times in total.
pub struct Greeting {
    rounds: u32,
    heard: Rc<RefCell<Vec<Time>>>,
}

impl Greeting {
    pub fn new(rounds: u32) -> Self {
        Self {
            rounds,
            heard: Rc::default(),
        }
    }

    /// Simulation times at which a greeting ran, across every run seeded by this value.
    pub fn heard(&self) -> Vec<Time> {
        self.heard.borrow().clone()
    }
}

struct Greeter {
    remaining: u32,
    heard: Rc<RefCell<Vec<Time>>>,
}

impl Entity for Greeter {
    fn describe(&self) -> String {
        format!("greeter({} left)", self.remaining)
    }
}

struct Greet;

impl Operation for Greet {
    type Output = ();

    fn name() -> &'static str {
        "greet"
    }
}

impl Handler<Greet> for Greeter {
    fn handle(&mut self, _op: Greet, cx: &mut Context<'_, Self, ()>) -> Reply<()> {
        cx.sim().log(format!("hello at {}", cx.sim().time_string()));
        self.heard.borrow_mut().push(cx.now());
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            cx.advance(1);
            if let Err(err) = cx.sim().send(cx.this(), Greet) {
                return Reply::err(err);
            }
        }
        Reply::ok(())
    }
}

impl Bootstrap for Greeting {
    fn name(&self) -> &str {
        "greeting"
    }

    fn seed(&self, sim: &Sim) -> Result<(), Failure> {
        if self.rounds == 0 {
            return Ok(());
        }
        let greeter = sim.create(Greeter {
            remaining: self.rounds,
            heard: self.heard.clone(),
        });
        sim.schedule_at(greeter, Greet, 0)?;
        Ok(())
    }
}
