//! Built-in entities every controller registers at creation.

use crate::controller::{Call, Sim};
use crate::entity::{Context, Entity, Handler, Operation, Reply};
use crate::time::Time;

/// Target of closures scheduled with `Sim::run_at`. Registry index 0.
pub struct Static;

impl Entity for Static {
    fn describe(&self) -> String {
        "static".into()
    }
}

/// Parks blocking callers until their wake-up time. Registry index 1.
pub struct Sleeper;

impl Entity for Sleeper {
    fn describe(&self) -> String {
        "sleeper".into()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sleep {
    pub ticks: Time,
}

impl Operation for Sleep {
    type Output = ();

    fn name() -> &'static str {
        "sleep"
    }
}

impl Handler<Sleep> for Sleeper {
    fn handle(&mut self, op: Sleep, cx: &mut Context<'_, Self, ()>) -> Reply<()> {
        let wake_at = cx.now().saturating_add(op.ticks);
        let waiter = cx.defer();
        match cx.sim().run_at(wake_at, move |sim| {
            waiter.ok(sim, ());
            Ok(())
        }) {
            Ok(()) => Reply::Deferred,
            Err(err) => Reply::err(err),
        }
    }
}

impl Sim {
    /// Suspend the calling process for `ticks`, unlike [`Sim::advance`] which
    /// moves time without yielding.
    pub fn sleep_block(&self, ticks: Time) -> Call<()> {
        self.call(self.sleeper(), Sleep { ticks })
    }
}
