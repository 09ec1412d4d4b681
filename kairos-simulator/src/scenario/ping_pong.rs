use std::cell::RefCell;
use std::rc::Rc;

use kairos_core::prelude::*;

use crate::driver::Bootstrap;

type Ball = Ref<Channel<u32>>;
type Returns = Rc<RefCell<Vec<(Time, u32)>>>;

/// Two players volleying a numbered ball over a pair of rendezvous channels.
///
/// The server sends ball `n` and waits for it to come back; the client
/// holds each ball for `swing` ticks before returning it. The server then
/// rests for `swing` ticks before the next serve, so ball `n` comes back at
/// `(2n + 1) * swing`.
pub struct PingPong {
    volleys: u32,
    swing: Time,
    returns: Returns,
}

impl PingPong {
    pub fn new(volleys: u32, swing: Time) -> Self {
        Self {
            volleys,
            swing,
            returns: Rc::default(),
        }
    }

    /// `(time, ball)` for every ball the server got back.
    pub fn returns(&self) -> Vec<(Time, u32)> {
        self.returns.borrow().clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Server,
    Client,
}

struct Player {
    side: Side,
    inbox: Ball,
    outbox: Ball,
    volleys: u32,
    swing: Time,
    returns: Returns,
}

impl Entity for Player {
    fn describe(&self) -> String {
        format!("{:?}", self.side).to_lowercase()
    }
}

struct Play;

impl Operation for Play {
    type Output = ();

    fn name() -> &'static str {
        "play"
    }
}

impl Handler<Play> for Player {
    fn handle(&mut self, _op: Play, cx: &mut Context<'_, Self, ()>) -> Reply<()> {
        let sim = cx.sim().clone();
        let (inbox, outbox, volleys, swing) = (self.inbox, self.outbox, self.volleys, self.swing);
        match self.side {
            Side::Server => {
                let returns = self.returns.clone();
                Reply::blocking(async move {
                    for ball in 0..volleys {
                        outbox.send(&sim, ball).await?;
                        let back = inbox.receive(&sim).await?;
                        sim.log(format!("server got ball {back} back"));
                        returns.borrow_mut().push((sim.now(), back));
                        if ball + 1 < volleys {
                            sim.sleep_block(swing).await?;
                        }
                    }
                    Ok(())
                })
            }
            Side::Client => Reply::blocking(async move {
                for _ in 0..volleys {
                    let ball = inbox.receive(&sim).await?;
                    sim.log(format!("client holds ball {ball}"));
                    sim.sleep_block(swing).await?;
                    outbox.send(&sim, ball).await?;
                }
                Ok(())
            }),
        }
    }
}

impl Bootstrap for PingPong {
    fn name(&self) -> &str {
        "ping-pong"
    }

    fn seed(&self, sim: &Sim) -> Result<(), Failure> {
        let serve: Ball = sim.create(Channel::new());
        let volley: Ball = sim.create(Channel::new());
        let player = |side, inbox, outbox| Player {
            side,
            inbox,
            outbox,
            volleys: self.volleys,
            swing: self.swing,
            returns: self.returns.clone(),
        };
        let server = sim.create(player(Side::Server, volley, serve));
        let client = sim.create(player(Side::Client, serve, volley));
        sim.send(server, Play)?;
        sim.send(client, Play)?;
        Ok(())
    }
}
