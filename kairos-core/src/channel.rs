//! ## kairos-core::channel
//! **Single-slot rendezvous channel**
//!
//! Built only from the public call/return protocol: each operation either
//! replies at once or defers the caller's continuation until the matching
//! operation arrives. At most one sender and one receiver may be blocked.
//!
//! - `receive` suspends until a datum is available
//! - `send` hands the datum to a waiting receiver, or parks it and suspends
//!   the sender until a receiver takes it; `send_with` takes the same drop
//!   options as `send_non_block` and returns at once when the datum is dropped
//! - `send_non_block` never suspends; it can drop the datum when nobody is
//!   listening or when the slot is occupied

use std::fmt;

use thiserror::Error;

use crate::controller::{Call, Deferred, Sim};
use crate::entity::{Context, Entity, Handler, Operation, Ref, Reply};
use crate::error::UsageError;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel already holds an undelivered datum")]
    SendPending,
    #[error("channel already has a blocked receiver")]
    ReceivePending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Drop the datum unless a receiver is already waiting.
    pub drop_if_no_receiver: bool,
    /// Drop the datum instead of failing when the slot is occupied.
    pub drop_if_full: bool,
}

pub struct Channel<T> {
    blocked_sender: Option<Deferred<()>>,
    blocked_receiver: Option<Deferred<T>>,
    data: Option<T>,
}

impl<T: 'static> Channel<T> {
    pub fn new() -> Self {
        Self {
            blocked_sender: None,
            blocked_receiver: None,
            data: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn has_blocked_receiver(&self) -> bool {
        self.blocked_receiver.is_some()
    }

    pub fn has_blocked_sender(&self) -> bool {
        self.blocked_sender.is_some()
    }

    /// Shared by both send forms. `Ok(Some(data))` means the datum must be
    /// parked in the slot.
    fn offer(&mut self, sim: &Sim, data: T, options: SendOptions) -> Result<Option<T>, ChannelError> {
        if options.drop_if_no_receiver && self.blocked_receiver.is_none() {
            return Ok(None);
        }
        if self.data.is_some() {
            return if options.drop_if_full {
                Ok(None)
            } else {
                Err(ChannelError::SendPending)
            };
        }
        match self.blocked_receiver.take() {
            Some(receiver) => {
                receiver.ok(sim, data);
                Ok(None)
            }
            None => Ok(Some(data)),
        }
    }
}

impl<T: 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Entity for Channel<T> {
    fn describe(&self) -> String {
        format!(
            "channel(data={}, sender={}, receiver={})",
            self.has_data(),
            self.has_blocked_sender(),
            self.has_blocked_receiver()
        )
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("has_data", &self.data.is_some())
            .field("blocked_sender", &self.blocked_sender.is_some())
            .field("blocked_receiver", &self.blocked_receiver.is_some())
            .finish()
    }
}

/// Blocking send.
pub struct ChannelSend<T> {
    pub data: T,
    pub options: SendOptions,
}

/// Non-blocking send.
pub struct ChannelSendNonBlock<T> {
    pub data: T,
    pub options: SendOptions,
}

/// Blocking receive.
pub struct ChannelReceive<T>(std::marker::PhantomData<fn() -> T>);

impl<T> Default for ChannelReceive<T> {
    fn default() -> Self {
        Self(std::marker::PhantomData)
    }
}

impl<T: 'static> Operation for ChannelSend<T> {
    type Output = ();

    fn name() -> &'static str {
        "channel.send"
    }
}

impl<T: 'static> Operation for ChannelSendNonBlock<T> {
    type Output = ();

    fn name() -> &'static str {
        "channel.send_non_block"
    }
}

impl<T: 'static> Operation for ChannelReceive<T> {
    type Output = T;

    fn name() -> &'static str {
        "channel.receive"
    }
}

impl<T: 'static> Handler<ChannelSend<T>> for Channel<T> {
    fn handle(&mut self, op: ChannelSend<T>, cx: &mut Context<'_, Self, ()>) -> Reply<()> {
        match self.offer(cx.sim(), op.data, op.options) {
            Ok(None) => Reply::ok(()),
            Ok(Some(data)) => {
                self.data = Some(data);
                self.blocked_sender = Some(cx.defer());
                Reply::Deferred
            }
            Err(err) => Reply::err(err),
        }
    }
}

impl<T: 'static> Handler<ChannelSendNonBlock<T>> for Channel<T> {
    fn handle(&mut self, op: ChannelSendNonBlock<T>, cx: &mut Context<'_, Self, ()>) -> Reply<()> {
        match self.offer(cx.sim(), op.data, op.options) {
            Ok(Some(data)) => {
                self.data = Some(data);
                Reply::ok(())
            }
            Ok(None) => Reply::ok(()),
            Err(err) => Reply::err(err),
        }
    }
}

impl<T: 'static> Handler<ChannelReceive<T>> for Channel<T> {
    fn handle(&mut self, _op: ChannelReceive<T>, cx: &mut Context<'_, Self, T>) -> Reply<T> {
        if self.blocked_receiver.is_some() {
            return Reply::err(ChannelError::ReceivePending);
        }
        match self.data.take() {
            Some(data) => {
                if let Some(sender) = self.blocked_sender.take() {
                    sender.ok(cx.sim(), ());
                }
                Reply::ok(data)
            }
            None => {
                self.blocked_receiver = Some(cx.defer());
                Reply::Deferred
            }
        }
    }
}

impl<T: 'static> Ref<Channel<T>> {
    pub fn send(&self, sim: &Sim, data: T) -> Call<()> {
        self.send_with(sim, data, SendOptions::default())
    }

    /// Blocking send that resolves immediately if `options` drop the datum.
    pub fn send_with(&self, sim: &Sim, data: T, options: SendOptions) -> Call<()> {
        sim.call(*self, ChannelSend { data, options })
    }

    pub fn receive(&self, sim: &Sim) -> Call<T> {
        sim.call(*self, ChannelReceive::default())
    }

    pub fn send_non_block(&self, sim: &Sim, data: T, options: SendOptions) -> Result<(), UsageError> {
        sim.send(*self, ChannelSendNonBlock { data, options })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;
    type Pipe = Ref<Channel<&'static str>>;

    struct Producer {
        chan: Pipe,
        options: SendOptions,
        log: Log,
    }
    impl Entity for Producer {}

    struct Produce(&'static str);
    impl Operation for Produce {
        type Output = ();
    }

    impl Handler<Produce> for Producer {
        fn handle(&mut self, op: Produce, cx: &mut Context<'_, Self, ()>) -> Reply<()> {
            let sim = cx.sim().clone();
            let (chan, options, log) = (self.chan, self.options, self.log.clone());
            Reply::blocking(async move {
                let line = match chan.send_with(&sim, op.0, options).await {
                    Ok(()) => format!("{} sent {}", sim.now(), op.0),
                    Err(failure) => format!("{} {:?}", sim.now(), failure.downcast_ref::<ChannelError>()),
                };
                log.borrow_mut().push(line);
                Ok(())
            })
        }
    }

    struct Consumer {
        chan: Pipe,
        log: Log,
    }
    impl Entity for Consumer {}

    struct Consume;
    impl Operation for Consume {
        type Output = ();
    }

    impl Handler<Consume> for Consumer {
        fn handle(&mut self, _op: Consume, cx: &mut Context<'_, Self, ()>) -> Reply<()> {
            let sim = cx.sim().clone();
            let (chan, log) = (self.chan, self.log.clone());
            Reply::blocking(async move {
                let line = match chan.receive(&sim).await {
                    Ok(data) => format!("{} got {data}", sim.now()),
                    Err(failure) => format!("{} {:?}", sim.now(), failure.downcast_ref::<ChannelError>()),
                };
                log.borrow_mut().push(line);
                Ok(())
            })
        }
    }

    fn setup() -> (Sim, Pipe, Log) {
        let sim = Sim::new();
        let chan = sim.create(Channel::new());
        (sim, chan, Rc::new(RefCell::new(Vec::new())))
    }

    fn producer(sim: &Sim, chan: Pipe, log: &Log) -> Ref<Producer> {
        producer_with(sim, chan, SendOptions::default(), log)
    }

    fn producer_with(sim: &Sim, chan: Pipe, options: SendOptions, log: &Log) -> Ref<Producer> {
        sim.create(Producer {
            chan,
            options,
            log: log.clone(),
        })
    }

    fn consumer(sim: &Sim, chan: Pipe, log: &Log) -> Ref<Consumer> {
        sim.create(Consumer {
            chan,
            log: log.clone(),
        })
    }

    #[test]
    fn receiver_first_rendezvous() {
        let (sim, chan, log) = setup();
        let rx = consumer(&sim, chan, &log);
        let tx = producer(&sim, chan, &log);
        sim.schedule_at(rx, Consume, 1).unwrap();
        sim.schedule_at(tx, Produce("x"), 5).unwrap();
        sim.run().unwrap();

        // the waiting receiver is resumed before the sender returns
        assert_eq!(*log.borrow(), vec!["5 got x", "5 sent x"]);
        assert_eq!(sim.pending_continuations(), 0);
    }

    #[test]
    fn sender_first_rendezvous() {
        let (sim, chan, log) = setup();
        let tx = producer(&sim, chan, &log);
        let rx = consumer(&sim, chan, &log);
        sim.schedule_at(tx, Produce("y"), 1).unwrap();
        sim.schedule_at(rx, Consume, 4).unwrap();
        sim.run().unwrap();

        // both resume at the receive time; the blocked sender is woken first
        assert_eq!(*log.borrow(), vec!["4 sent y", "4 got y"]);
        assert!(!sim.with(chan, |c| c.has_data()).unwrap());
    }

    #[test]
    fn second_pending_send_fails() {
        let (sim, chan, log) = setup();
        let first = producer(&sim, chan, &log);
        let second = producer(&sim, chan, &log);
        sim.schedule_at(first, Produce("a"), 1).unwrap();
        sim.schedule_at(second, Produce("b"), 2).unwrap();
        sim.run().unwrap();

        assert_eq!(*log.borrow(), vec!["2 Some(SendPending)"]);
        assert_eq!(sim.pending_continuations(), 1);
        assert_eq!(
            sim.describe(chan.raw()).unwrap(),
            "channel(data=true, sender=true, receiver=false)"
        );
    }

    #[test]
    fn second_pending_receive_fails() {
        let (sim, chan, log) = setup();
        let first = consumer(&sim, chan, &log);
        let second = consumer(&sim, chan, &log);
        sim.schedule_at(first, Consume, 1).unwrap();
        sim.schedule_at(second, Consume, 1).unwrap();
        sim.run().unwrap();

        assert_eq!(*log.borrow(), vec!["1 Some(ReceivePending)"]);
    }

    #[test]
    fn non_blocking_send_honours_drop_options() {
        let (sim, chan, log) = setup();
        let rx = consumer(&sim, chan, &log);

        // nobody listening yet: dropped
        let unheard = SendOptions {
            drop_if_no_receiver: true,
            ..SendOptions::default()
        };
        chan.send_non_block(&sim, "dropped", unheard).unwrap();
        // parked without blocking, then a full-slot send is ignored
        chan.send_non_block(&sim, "kept", SendOptions::default()).unwrap();
        let full = SendOptions {
            drop_if_full: true,
            ..SendOptions::default()
        };
        chan.send_non_block(&sim, "ignored", full).unwrap();
        sim.schedule_at(rx, Consume, 3).unwrap();

        sim.run().unwrap();
        assert_eq!(*log.borrow(), vec!["3 got kept"]);
        assert!(!sim.with(chan, |c| c.has_data()).unwrap());
    }

    #[test]
    fn blocking_send_returns_at_once_when_nobody_listens() {
        let (sim, chan, log) = setup();
        let unheard = SendOptions {
            drop_if_no_receiver: true,
            ..SendOptions::default()
        };
        let tx = producer_with(&sim, chan, unheard, &log);
        sim.schedule_at(tx, Produce("lost"), 1).unwrap();
        sim.run().unwrap();

        assert_eq!(*log.borrow(), vec!["1 sent lost"]);
        assert!(!sim.with(chan, |c| c.has_data()).unwrap());
        assert_eq!(sim.pending_continuations(), 0);
    }

    #[test]
    fn blocking_send_into_full_slot_can_drop() {
        let (sim, chan, log) = setup();
        let full = SendOptions {
            drop_if_full: true,
            ..SendOptions::default()
        };
        let first = producer(&sim, chan, &log);
        let second = producer_with(&sim, chan, full, &log);
        let rx = consumer(&sim, chan, &log);
        sim.schedule_at(first, Produce("a"), 1).unwrap();
        sim.schedule_at(second, Produce("b"), 2).unwrap();
        sim.schedule_at(rx, Consume, 4).unwrap();
        sim.run().unwrap();

        // the dropping sender never blocks; the parked one waits for the receiver
        assert_eq!(*log.borrow(), vec!["2 sent b", "4 sent a", "4 got a"]);
        assert_eq!(sim.pending_continuations(), 0);
    }

    #[test]
    fn non_blocking_send_into_full_slot_aborts_the_run() {
        let (sim, chan, _log) = setup();
        chan.send_non_block(&sim, "first", SendOptions::default()).unwrap();
        chan.send_non_block(&sim, "second", SendOptions::default()).unwrap();
        let err = sim.run().unwrap_err();
        assert_eq!(
            err.failure().and_then(|f| f.downcast_ref::<ChannelError>()),
            Some(&ChannelError::SendPending)
        );
    }
}
