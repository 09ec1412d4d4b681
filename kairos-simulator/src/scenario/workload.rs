use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use kairos_core::prelude::*;

use crate::driver::Bootstrap;

const MAX_DELAY: Time = 16;

/// Seeded hop traffic between `entities` nodes; exactly `events` hops are
/// dispatched in total.
///
/// Each hop forwards to a random peer after a random delay, zero included,
/// so same-time ties are common.
pub struct RandomWorkload {
    seed: u64,
    entities: u32,
    events: u64,
}

impl RandomWorkload {
    pub fn new(seed: u64, entities: u32, events: u64) -> Self {
        Self {
            seed,
            entities,
            events,
        }
    }
}

struct Traffic {
    rng: SmallRng,
    nodes: Vec<Ref<Node>>,
    budget: u64,
}

struct Node {
    id: u32,
    traffic: Rc<RefCell<Traffic>>,
    received: u64,
}

impl Entity for Node {
    fn describe(&self) -> String {
        format!("node {} ({} hops)", self.id, self.received)
    }
}

struct Hop;

impl Operation for Hop {
    type Output = ();

    fn name() -> &'static str {
        "hop"
    }
}

impl Handler<Hop> for Node {
    fn handle(&mut self, _op: Hop, cx: &mut Context<'_, Self, ()>) -> Reply<()> {
        self.received += 1;
        let (peer, delay) = {
            let mut traffic = self.traffic.borrow_mut();
            if traffic.budget == 0 {
                return Reply::ok(());
            }
            traffic.budget -= 1;
            let peers = traffic.nodes.len();
            let peer = traffic.rng.random_range(0..peers);
            let delay = traffic.rng.random_range(0..=MAX_DELAY);
            (traffic.nodes[peer], delay)
        };
        cx.sim().send_after(peer, Hop, delay).map_err(Failure::from).into()
    }
}

impl Bootstrap for RandomWorkload {
    fn name(&self) -> &str {
        "random-workload"
    }

    fn seed(&self, sim: &Sim) -> Result<(), Failure> {
        if self.entities == 0 || self.events == 0 {
            return Ok(());
        }
        let starters = u64::from(self.entities).min(self.events);
        let shared = Rc::new(RefCell::new(Traffic {
            rng: SmallRng::seed_from_u64(self.seed),
            nodes: Vec::with_capacity(self.entities as usize),
            budget: self.events - starters,
        }));

        let nodes: Vec<Ref<Node>> = (0..self.entities)
            .map(|id| {
                sim.create(Node {
                    id,
                    traffic: shared.clone(),
                    received: 0,
                })
            })
            .collect();
        let mut traffic = shared.borrow_mut();
        traffic.nodes = nodes.clone();
        for &node in nodes.iter().take(starters as usize) {
            let at = traffic.rng.random_range(0..=MAX_DELAY);
            sim.schedule_at(node, Hop, at)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairos_config::ControllerConfig;

    #[test]
    fn dispatches_exactly_the_requested_hops() {
        let sim = Sim::from_config(&ControllerConfig {
            count_events: true,
            ..ControllerConfig::default()
        });
        RandomWorkload::new(7, 5, 200).seed(&sim).unwrap();
        let summary = sim.run().unwrap();
        assert_eq!(summary.events, 200);
        assert_eq!(summary.operations.get("hop"), Some(&200));
    }

    #[test]
    fn fewer_events_than_nodes() {
        let sim = Sim::new();
        RandomWorkload::new(1, 10, 3).seed(&sim).unwrap();
        assert_eq!(sim.queue_len(), 3);
        assert_eq!(sim.run().unwrap().events, 3);
    }
}
